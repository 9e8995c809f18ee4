use owo_colors::OwoColorize;
use std::path::Path;
use storage::*;

macro_rules! errln {
    ($($arg:tt)*) => {
        eprintln!("{} {}", "[!]".red().bold(), format!($($arg)*))
    };
}

/// Opens an image file from the host and mounts every disk it holds.
pub fn mount(root: &mut RootFs, path: &str) -> FsResult {
    let io = NativeIo::open(path)?;
    let image = open_image(io)?;
    root.mount(Box::new(MultiImageFs::open(image)?))
}

pub fn list(root: &mut RootFs) -> FsResult {
    for meta in root.list()? {
        let (size, unit) = humanized_size(meta.size);
        let modified = meta
            .modified
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let name = if meta.is_dir() {
            format!("{}/", meta.name).blue().bold().to_string()
        } else {
            meta.name.clone()
        };
        let flags = format!(
            "{}{}{}",
            if meta.is_dir() { 'd' } else { '-' },
            if meta.writable { 'w' } else { '-' },
            if meta.system { 's' } else { '-' },
        );
        println!("{} {:>7.1}{} {:>16}  {}", flags, size, unit, modified, name);
    }
    Ok(())
}

/// Follows a `/`-separated path; a leading `/` starts from the top level.
pub fn change_dir(root: &mut RootFs, path: &str) -> FsResult {
    if path.starts_with(PATH_SEPARATOR) {
        while root.cwd()? != PATH_SEPARATOR.to_string() {
            root.chdir("..")?;
        }
    }
    for component in path.split(PATH_SEPARATOR).filter(|c| !c.is_empty()) {
        root.chdir(component)?;
    }
    Ok(())
}

pub fn cat(root: &mut RootFs, name: &str) -> FsResult {
    let mut io = root.get_io(name, &EntryOptions::default())?;
    let mut data = Vec::new();
    io.read_all(&mut data)?;
    io.close()?;
    println!("{}", String::from_utf8_lossy(&data));
    Ok(())
}

pub fn get(root: &mut RootFs, name: &str, dest: Option<&str>) -> FsResult {
    let mut io = root.get_io(name, &EntryOptions::default())?;
    let mut data = Vec::new();
    io.read_all(&mut data)?;
    io.close()?;
    let dest = dest.unwrap_or(name);
    std::fs::write(dest, &data)?;
    info!("Copied {} bytes to {}.", data.len(), dest);
    Ok(())
}

pub fn put(root: &mut RootFs, src: &str, name: Option<&str>) -> FsResult {
    let data = std::fs::read(src)?;
    let name = match name {
        Some(name) => name.to_string(),
        None => Path::new(src)
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_uppercase())
            .ok_or_else(|| FsError::InvalidPath(src.into()))?,
    };
    let mut io = root.get_io(&name, &EntryOptions::create())?;
    io.write(&data)?;
    io.close()?;
    info!("Copied {} bytes to {}.", data.len(), name);
    Ok(())
}

pub fn report(result: FsResult) {
    if let Err(err) = result {
        errln!("{}", err);
    }
}
