use crate::system::
{
    System,
    SystemError,
};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;


#[derive(Debug, Clone)]
pub struct RealSystem
{
}

impl RealSystem
{
    pub fn new() -> Self
    {
        RealSystem{}
    }
}

fn convert_io_error_to_system_error(error : std::io::Error) -> SystemError
{
    match error.kind()
    {
        ErrorKind::NotFound
            => SystemError::NotFound,

        _ => SystemError::Weird,
    }
}


impl System for RealSystem
{
    type File = fs::File;

    fn open(&self, path: &str) -> Result<Self::File, SystemError>
    {
        match fs::File::open(path)
        {
            Ok(file) => Ok(file),
            Err(error) => Err(convert_io_error_to_system_error(error)),
        }
    }

    fn create_file(&mut self, path: &str) -> Result<Self::File, SystemError>
    {
        match fs::File::create(path)
        {
            Ok(file) => Ok(file),
            Err(error) => Err(convert_io_error_to_system_error(error)),
        }
    }

    fn create_dir_all(&mut self, path: &str) -> Result<(), SystemError>
    {
        match fs::create_dir_all(path)
        {
            Ok(_) => Ok(()),
            Err(error) => Err(convert_io_error_to_system_error(error)),
        }
    }

    fn is_file(&self, path: &str) -> bool
    {
        Path::new(path).is_file()
    }

    fn is_dir(&self, path: &str) -> bool
    {
        Path::new(path).is_dir()
    }

    fn remove_file(&mut self, path: &str) -> Result<(), SystemError>
    {
        match fs::remove_file(path)
        {
            Ok(_) => Ok(()),
            Err(error) => Err(convert_io_error_to_system_error(error)),
        }
    }

    fn get_modified(&self, path: &str) -> Result<SystemTime, SystemError>
    {
        match fs::metadata(path)
        {
            Ok(metadata) =>
            {
                match metadata.modified()
                {
                    Ok(timestamp) => Ok(timestamp),
                    Err(_) => Err(SystemError::ModifiedNotFound)
                }
            },
            Err(_) => Err(SystemError::MetadataNotFound)
        }
    }

    fn list_files_in_dir(&self, dir: &str) -> Vec<String>
    {
        let search_dir = if dir == "" { "." } else { dir };

        let mut result : Vec<String> = WalkDir::new(search_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry|
                entry.path().strip_prefix(search_dir).ok()
                    .and_then(|relative| relative.to_str())
                    .map(|name|
                        if dir == "" { name.to_string() } else { format!("{}/{}", dir, name) }
                    )
            )
            .collect();

        result.sort();
        result
    }
}
