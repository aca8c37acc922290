use std::io::Read;

use filetime::FileTime;
use tar::{Entry, EntryType};

use super::EntrySource;
use crate::entry::{Acl, EntryHeader, EntryKind};
use crate::{Error, Result};

pub(crate) struct TarSource<'a, R: Read> {
    entries: tar::Entries<'a, R>,
}

impl<'a, R: Read> TarSource<'a, R> {
    pub(crate) fn new(entries: tar::Entries<'a, R>) -> Self {
        Self { entries }
    }
}

impl<'a, R: Read + 'a> EntrySource for TarSource<'a, R> {
    fn next_entry(&mut self) -> Result<Option<(EntryHeader, Box<dyn Read + '_>)>> {
        for entry in self.entries.by_ref() {
            let mut entry = entry.map_err(Error::header)?;
            if entry.header().entry_type().is_pax_global_extensions() {
                continue;
            }
            let header = read_header(&mut entry)?;
            return Ok(Some((header, Box::new(entry))));
        }
        Ok(None)
    }
}

fn read_header<R: Read>(entry: &mut Entry<'_, R>) -> Result<EntryHeader> {
    let path = entry.path().map_err(Error::header)?.into_owned();
    let kind = entry_kind(entry)?;
    let size = if kind == EntryKind::File {
        entry.size()
    } else {
        0
    };

    let raw = entry.header();
    let mode = raw.mode().ok();
    let mut mtime = raw
        .mtime()
        .ok()
        .map(|secs| FileTime::from_unix_time(secs as i64, 0));
    let mut atime = None;
    let mut acl = Acl::default();
    let mut fflags = None;

    if let Some(extensions) = entry.pax_extensions().map_err(Error::header)? {
        for extension in extensions {
            let extension = extension.map_err(Error::header)?;
            let (Ok(key), Ok(value)) = (extension.key(), extension.value()) else {
                continue;
            };
            match key {
                "mtime" => mtime = parse_pax_time(value).or(mtime),
                "atime" => atime = parse_pax_time(value),
                "SCHILY.acl.access" => acl.access = Some(value.to_string()),
                "SCHILY.acl.default" => acl.default = Some(value.to_string()),
                "SCHILY.fflags" => fflags = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(EntryHeader {
        path,
        kind,
        size,
        mode,
        mtime,
        atime,
        acl,
        fflags,
    })
}

fn entry_kind<R: Read>(entry: &Entry<'_, R>) -> Result<EntryKind> {
    let header = entry.header();
    let entry_type = header.entry_type();
    let device = || {
        let major = header.device_major().ok().flatten().unwrap_or(0);
        let minor = header.device_minor().ok().flatten().unwrap_or(0);
        (major, minor)
    };

    let kind = match entry_type {
        EntryType::Directory => EntryKind::Directory,
        EntryType::Symlink => EntryKind::Symlink {
            target: link_target(entry)?,
        },
        EntryType::Link => EntryKind::HardLink {
            target: link_target(entry)?,
        },
        EntryType::Fifo => EntryKind::Fifo,
        EntryType::Char => {
            let (major, minor) = device();
            EntryKind::CharDevice { major, minor }
        }
        EntryType::Block => {
            let (major, minor) = device();
            EntryKind::BlockDevice { major, minor }
        }
        // Pre-POSIX archives mark directories with a trailing slash only.
        EntryType::Regular if entry.path_bytes().ends_with(b"/") => EntryKind::Directory,
        // Regular, contiguous, sparse and vendor types all carry plain content.
        _ => EntryKind::File,
    };
    Ok(kind)
}

fn link_target<R: Read>(entry: &Entry<'_, R>) -> Result<std::path::PathBuf> {
    match entry.link_name().map_err(Error::header)? {
        Some(target) => Ok(target.into_owned()),
        None => Err(Error::header(format!(
            "link entry '{}' has no target",
            entry.path().map_err(Error::header)?.display()
        ))),
    }
}

/// Parse a PAX time value: decimal seconds with an optional fraction.
fn parse_pax_time(value: &str) -> Option<FileTime> {
    let (secs, frac) = value.split_once('.').unwrap_or((value, ""));
    let secs: i64 = secs.parse().ok()?;
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: String = frac.chars().chain("000000000".chars()).take(9).collect();
    let nanos: u32 = digits.parse().ok()?;
    // `-1.5` is 1.5 seconds before the epoch, the fraction counts downwards too.
    if value.starts_with('-') && nanos > 0 {
        return Some(FileTime::from_unix_time(secs - 1, 1_000_000_000 - nanos));
    }
    Some(FileTime::from_unix_time(secs, nanos))
}
