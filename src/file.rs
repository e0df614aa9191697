use crate::system::System;
use std::io::Read;
use std::str::from_utf8;
use std::fmt;

pub enum ReadFileToStringError
{
    IOError(String, std::io::Error),
    NotFound(String),
    NotUtf8(String),
}

impl fmt::Display for ReadFileToStringError
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            ReadFileToStringError::IOError(path, error) =>
                write!(formatter, "Error opening {} for read: {}", path, error),

            ReadFileToStringError::NotFound(path) =>
                write!(formatter, "File not found: {}", path),

            ReadFileToStringError::NotUtf8(path) =>
                write!(formatter, "Cannot interpret as UTF8: {}", path),
        }
    }
}

/*  Reads `path` out of `system` as a UTF8 string. */
pub fn read_file_to_string<SystemType: System>(
    system: &SystemType,
    path: &str,
) -> Result<String, ReadFileToStringError>
{
    let mut file = system.open(path)
        .map_err(|_| ReadFileToStringError::NotFound(path.to_string()))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|error| ReadFileToStringError::IOError(path.to_string(), error))?;

    match from_utf8(&content)
    {
        Ok(text) => Ok(text.to_owned()),
        Err(_) => Err(ReadFileToStringError::NotUtf8(path.to_string())),
    }
}
