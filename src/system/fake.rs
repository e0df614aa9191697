use crate::system::
{
    System,
    SystemError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::io::{self, Read, Write};
use std::time::{SystemTime, Duration};

/*  An in-memory System for tests. Paths are flat string keys (no nested
    directory tree) since the engine only ever needs existence, content,
    and a settable mtime per path -- never real directory semantics like
    rename. Mtimes are assigned by a monotonically increasing fake clock
    unless a test pins one explicitly with `set_modified`. */
#[derive(Clone)]
pub struct FakeSystem
{
    files : Arc<Mutex<HashMap<String, FakeFile>>>,
    clock : Arc<Mutex<u64>>,
}

#[derive(Clone)]
struct FakeFile
{
    content : Vec<u8>,
    modified : u64,
}

fn tick_to_time(tick : u64) -> SystemTime
{
    SystemTime::UNIX_EPOCH + Duration::from_secs(tick)
}

pub struct FakeHandle
{
    path : String,
    files : Arc<Mutex<HashMap<String, FakeFile>>>,
    cursor : usize,
    write_buffer : Vec<u8>,
}

impl std::fmt::Debug for FakeHandle
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result
    {
        write!(formatter, "FakeHandle({})", self.path)
    }
}

impl Read for FakeHandle
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>
    {
        let files = self.files.lock().unwrap();
        let content = match files.get(&self.path)
        {
            Some(file) => &file.content,
            None => return Ok(0),
        };

        let remaining = &content[self.cursor.min(content.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        Ok(n)
    }
}

impl Write for FakeHandle
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        self.write_buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()>
    {
        if !self.write_buffer.is_empty()
        {
            let mut files = self.files.lock().unwrap();
            let entry = files.entry(self.path.clone()).or_insert(FakeFile { content: vec![], modified: 0 });
            entry.content.extend_from_slice(&self.write_buffer);
            self.write_buffer.clear();
        }
        Ok(())
    }
}

impl Drop for FakeHandle
{
    fn drop(&mut self)
    {
        let _ = self.flush();
    }
}

impl FakeSystem
{
    pub fn new() -> Self
    {
        FakeSystem
        {
            files : Arc::new(Mutex::new(HashMap::new())),
            clock : Arc::new(Mutex::new(1)),
        }
    }

    fn tick(&self) -> u64
    {
        let mut clock = self.clock.lock().unwrap();
        *clock += 1;
        *clock
    }

    pub fn write_str(&mut self, path : &str, content : &str) -> Result<(), SystemError>
    {
        let tick = self.tick();
        let mut files = self.files.lock().unwrap();
        files.insert(path.to_string(), FakeFile { content: content.as_bytes().to_vec(), modified: tick });
        Ok(())
    }

    pub fn read_to_string(&self, path : &str) -> Result<String, SystemError>
    {
        let files = self.files.lock().unwrap();
        match files.get(path)
        {
            Some(file) => String::from_utf8(file.content.clone()).map_err(|_| SystemError::Weird),
            None => Err(SystemError::NotFound),
        }
    }

    /*  Lets a staleness test force a dep to appear newer or older than a
        target without re-writing its content. */
    pub fn set_modified(&mut self, path : &str, tick : u64)
    {
        let mut files = self.files.lock().unwrap();
        if let Some(file) = files.get_mut(path)
        {
            file.modified = tick;
        }
    }
}

impl System for FakeSystem
{
    type File = FakeHandle;

    fn open(&self, path: &str) -> Result<Self::File, SystemError>
    {
        let files = self.files.lock().unwrap();
        if files.contains_key(path)
        {
            Ok(FakeHandle { path: path.to_string(), files: self.files.clone(), cursor: 0, write_buffer: vec![] })
        }
        else
        {
            Err(SystemError::NotFound)
        }
    }

    fn create_file(&mut self, path: &str) -> Result<Self::File, SystemError>
    {
        let tick = self.tick();
        let mut files = self.files.lock().unwrap();
        files.insert(path.to_string(), FakeFile { content: vec![], modified: tick });
        Ok(FakeHandle { path: path.to_string(), files: self.files.clone(), cursor: 0, write_buffer: vec![] })
    }

    fn create_dir_all(&mut self, _path: &str) -> Result<(), SystemError>
    {
        Ok(())
    }

    fn is_file(&self, path: &str) -> bool
    {
        self.files.lock().unwrap().contains_key(path)
    }

    fn is_dir(&self, path: &str) -> bool
    {
        let prefix = format!("{}/", path);
        self.files.lock().unwrap().keys().any(|key| key.starts_with(&prefix))
    }

    fn remove_file(&mut self, path: &str) -> Result<(), SystemError>
    {
        let mut files = self.files.lock().unwrap();
        match files.remove(path)
        {
            Some(_) => Ok(()),
            None => Err(SystemError::RemoveNonExistentFile),
        }
    }

    fn get_modified(&self, path: &str) -> Result<SystemTime, SystemError>
    {
        let files = self.files.lock().unwrap();
        match files.get(path)
        {
            Some(file) => Ok(tick_to_time(file.modified)),
            None => Err(SystemError::MetadataNotFound),
        }
    }

    fn list_files_in_dir(&self, dir: &str) -> Vec<String>
    {
        let prefix = if dir == "" { "".to_string() } else { format!("{}/", dir) };
        let files = self.files.lock().unwrap();

        let mut result : Vec<String> = files.keys()
            .filter(|key| key.starts_with(&prefix) && !key[prefix.len()..].contains('/'))
            .cloned()
            .collect();

        result.sort();
        result
    }
}
