use std::fs::File;
use std::io::{self, Read};

use filetime::FileTime;
use zip::ZipArchive;

use super::EntrySource;
use crate::entry::{EntryHeader, EntryKind};
use crate::{Error, Result};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub(crate) struct ZipSource<'a> {
    archive: &'a mut ZipArchive<File>,
    index: usize,
}

impl<'a> ZipSource<'a> {
    pub(crate) fn new(archive: &'a mut ZipArchive<File>) -> Self {
        Self { archive, index: 0 }
    }
}

impl EntrySource for ZipSource<'_> {
    fn next_entry(&mut self) -> Result<Option<(EntryHeader, Box<dyn Read + '_>)>> {
        if self.index >= self.archive.len() {
            return Ok(None);
        }
        let mut file = self.archive.by_index(self.index).map_err(Error::header)?;
        self.index += 1;

        // Raw name on purpose: the disk writer owns path policy.
        let mut header = EntryHeader::new(file.name(), EntryKind::File);
        let unix_mode = file.unix_mode();
        header.mode = unix_mode.map(|mode| mode & 0o7777);
        // DOS timestamps carry no zone and are taken as UTC.
        header.mtime = file
            .last_modified()
            .and_then(|dt| time::OffsetDateTime::try_from(dt).ok())
            .map(|utc| FileTime::from_unix_time(utc.unix_timestamp(), 0));

        if file.is_dir() {
            header.kind = EntryKind::Directory;
            return Ok(Some((header, Box::new(io::empty()))));
        }

        // Zip stores a symlink's target as the entry content.
        if unix_mode.is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            let mut target = String::new();
            file.read_to_string(&mut target).map_err(|e| {
                Error::header(format!("symlink '{}': {e}", header.path.display()))
            })?;
            header.kind = EntryKind::Symlink {
                target: target.into(),
            };
            return Ok(Some((header, Box::new(io::empty()))));
        }

        header.size = file.size();
        Ok(Some((header, Box::new(file))))
    }
}
