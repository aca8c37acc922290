//! File-name suffix tables.
//!
//! These only advise which codec names apply to a file name. Extraction never
//! consults them; codecs are negotiated from the content itself.

/// Compression filter suffixes.
static FILTERS: &[(&str, &str)] = &[
    (".Z", "compress"),
    (".bz2", "bzip2"),
    (".gz", "gzip"),
    (".grz", "grzip"),
    (".lrz", "lrzip"),
    (".lz", "lzip"),
    (".lz4", "lz4"),
    (".lzo", "lzop"),
    (".lzma", "lzma"),
    (".uu", "uuencode"),
    (".xz", "xz"),
    (".zst", "zstd"),
];

/// Container format suffixes.
static FORMATS: &[(&str, &str)] = &[
    (".7z", "7zip"),
    (".ar", "arbsd"),
    (".cpio", "cpio"),
    (".iso", "iso9660"),
    (".mtree", "mtree"),
    (".shar", "shar"),
    (".tar", "paxr"),
    (".warc", "warc"),
    (".xar", "xar"),
    (".zip", "zip"),
];

/// Single suffixes standing for a format plus a filter.
static ALIASES: &[(&str, &str)] = &[
    (".taz", ".tar.gz"),
    (".tgz", ".tar.gz"),
    (".tbz", ".tar.bz2"),
    (".tbz2", ".tar.bz2"),
    (".tz2", ".tar.bz2"),
    (".tlz", ".tar.lzma"),
    (".txz", ".tar.xz"),
    (".tzo", ".tar.lzo"),
    (".taZ", ".tar.Z"),
    (".tZ", ".tar.Z"),
    (".tzst", ".tar.zst"),
];

fn lookup(table: &'static [(&'static str, &'static str)], suffix: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == suffix)
        .map(|(_, value)| *value)
}

/// Canonical filter name for a suffix such as `.gz`.
pub fn filter_of(suffix: &str) -> Option<&'static str> {
    lookup(FILTERS, suffix)
}

/// Canonical format name for a suffix such as `.tar`.
pub fn format_of(suffix: &str) -> Option<&'static str> {
    lookup(FORMATS, suffix)
}

/// Expansion of an alias suffix, e.g. `.tgz` to `.tar.gz`.
pub fn decompose_alias(suffix: &str) -> Option<&'static str> {
    lookup(ALIASES, suffix)
}

/// A file name split into its stem and the codec names its suffixes advise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    pub stem: String,
    pub format: Option<&'static str>,
    pub filter: Option<&'static str>,
}

/// Split `file_name` into a stem and advised codecs.
///
/// Alias suffixes are expanded first, so `pkg.tgz` classifies like
/// `pkg.tar.gz`. A name with no known suffix is returned whole as the stem.
pub fn classify(file_name: &str) -> Classified {
    let (mut rest, expanded) = match split_suffix(file_name) {
        Some((stem, suffix)) => match decompose_alias(suffix) {
            Some(full) => (stem, Some(full)),
            None => (file_name, None),
        },
        None => (file_name, None),
    };

    // An alias always expands to `.tar` plus exactly one filter.
    if let Some(full) = expanded {
        let filter = full.strip_prefix(".tar").and_then(filter_of);
        return Classified {
            stem: rest.to_string(),
            format: format_of(".tar"),
            filter,
        };
    }

    let mut filter = None;
    if let Some((stem, suffix)) = split_suffix(rest)
        && let Some(name) = filter_of(suffix)
    {
        filter = Some(name);
        rest = stem;
    }

    let mut format = None;
    if let Some((stem, suffix)) = split_suffix(rest)
        && let Some(name) = format_of(suffix)
    {
        format = Some(name);
        rest = stem;
    }

    Classified {
        stem: rest.to_string(),
        format,
        filter,
    }
}

/// Split off the last `.suffix`, keeping the dot. Hidden-file names such as
/// `.bashrc` have no suffix.
fn split_suffix(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some((&name[..dot], &name[dot..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_filter_row() {
        let expected = [
            (".Z", "compress"),
            (".bz2", "bzip2"),
            (".gz", "gzip"),
            (".grz", "grzip"),
            (".lrz", "lrzip"),
            (".lz", "lzip"),
            (".lz4", "lz4"),
            (".lzo", "lzop"),
            (".lzma", "lzma"),
            (".uu", "uuencode"),
            (".xz", "xz"),
            (".zst", "zstd"),
        ];
        for (suffix, name) in expected {
            assert_eq!(filter_of(suffix), Some(name), "{suffix}");
        }
    }

    #[test]
    fn every_format_row() {
        assert_eq!(format_of(".7z"), Some("7zip"));
        assert_eq!(format_of(".ar"), Some("arbsd"));
        assert_eq!(format_of(".cpio"), Some("cpio"));
        assert_eq!(format_of(".iso"), Some("iso9660"));
        assert_eq!(format_of(".mtree"), Some("mtree"));
        assert_eq!(format_of(".shar"), Some("shar"));
        assert_eq!(format_of(".tar"), Some("paxr"));
        assert_eq!(format_of(".warc"), Some("warc"));
        assert_eq!(format_of(".xar"), Some("xar"));
        assert_eq!(format_of(".zip"), Some("zip"));
    }

    #[test]
    fn unknown_suffixes() {
        assert_eq!(format_of(".xyz"), None);
        assert_eq!(filter_of(".tar"), None);
        assert_eq!(decompose_alias(".gz"), None);
        assert_eq!(filter_of(""), None);
    }

    #[test]
    fn lookups_are_case_sensitive() {
        assert_eq!(filter_of(".Z"), Some("compress"));
        assert_eq!(filter_of(".z"), None);
        assert_eq!(decompose_alias(".taZ"), Some(".tar.Z"));
        assert_eq!(decompose_alias(".TGZ"), None);
    }

    #[test]
    fn aliases() {
        assert_eq!(decompose_alias(".tgz"), Some(".tar.gz"));
        assert_eq!(decompose_alias(".taz"), Some(".tar.gz"));
        assert_eq!(decompose_alias(".tbz"), Some(".tar.bz2"));
        assert_eq!(decompose_alias(".tbz2"), Some(".tar.bz2"));
        assert_eq!(decompose_alias(".tz2"), Some(".tar.bz2"));
        assert_eq!(decompose_alias(".tlz"), Some(".tar.lzma"));
        assert_eq!(decompose_alias(".txz"), Some(".tar.xz"));
        assert_eq!(decompose_alias(".tzo"), Some(".tar.lzo"));
        assert_eq!(decompose_alias(".tZ"), Some(".tar.Z"));
        assert_eq!(decompose_alias(".tzst"), Some(".tar.zst"));
    }

    #[test]
    fn classify_compound_suffix() {
        let c = classify("node-v20.1.0-linux-x64.tar.xz");
        assert_eq!(c.stem, "node-v20.1.0-linux-x64");
        assert_eq!(c.format, Some("paxr"));
        assert_eq!(c.filter, Some("xz"));
    }

    #[test]
    fn classify_alias() {
        let c = classify("pkg.tgz");
        assert_eq!(c.stem, "pkg");
        assert_eq!(c.format, Some("paxr"));
        assert_eq!(c.filter, Some("gzip"));
    }

    #[test]
    fn classify_format_only_and_filter_only() {
        let zip = classify("tool.zip");
        assert_eq!((zip.stem.as_str(), zip.format, zip.filter), ("tool", Some("zip"), None));

        let gz = classify("notes.txt.gz");
        assert_eq!((gz.stem.as_str(), gz.format, gz.filter), ("notes.txt", None, Some("gzip")));
    }

    #[test]
    fn classify_unknown_keeps_name() {
        let c = classify("README");
        assert_eq!(c.stem, "README");
        assert_eq!(c.format, None);
        assert_eq!(c.filter, None);

        assert_eq!(classify(".zip").stem, ".zip");
    }
}
