//! Optional dump of every visited leaf, used while writing variable
//! declarations for a new source: it shows the dotted path and type of each
//! value exactly as the flattener sees it.

use crate::classify::Scalar;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use url::Url;

const LOG_TARGET: &str = "debug";

/// Write one leaf entry.
pub fn write_leaf(out: &mut dyn Write, path: &str, leaf: &Scalar<'_>) -> io::Result<()> {
    write!(
        out,
        "Field: Node:{}\n       Value:{} ({})\n",
        path,
        leaf,
        leaf.kind()
    )
}

/// File name of the dump for a source: `webapi_debug_<host[:port]>-<query>.txt`.
///
/// Path separators in the host or query are replaced so the name never
/// points into another directory.
pub fn file_name(source: Option<&Url>) -> String {
    let (host, query) = match source {
        Some(url) => {
            let host = url.host_str().unwrap_or_default();
            let host = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            (host, url.query().unwrap_or_default().to_string())
        }
        None => (String::new(), String::new()),
    };
    let name = format!("webapi_debug_{}-{}.txt", host, query);
    name.replace(['/', '\\'], "_")
}

/// Create the dump file for `source` inside `dir`.
pub fn create(dir: &Path, source: Option<&Url>) -> io::Result<BufWriter<File>> {
    let file = File::create(dir.join(file_name(source)))?;
    Ok(BufWriter::new(file))
}

/// Like [`create`], but a failure only disables the dump.
pub fn open(dir: &Path, source: Option<&Url>) -> Option<BufWriter<File>> {
    match create(dir, source) {
        Ok(out) => Some(out),
        Err(e) => {
            log::warn!(
                target: LOG_TARGET,
                "Could not create debug dump '{}' in '{}': {e}",
                file_name(source),
                dir.display()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_entry_format() {
        let mut buf = Vec::new();
        write_leaf(&mut buf, "a__b", &Scalar::String("10 MB")).unwrap();
        write_leaf(&mut buf, "a__c", &Scalar::Number(2.5)).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Field: Node:a__b\n       Value:10 MB (string)\n\
             Field: Node:a__c\n       Value:2.5 (number)\n"
        );
    }

    #[test]
    fn file_name_uses_host_port_and_query() {
        let url = Url::parse("http://test.example.com:8080/oscamapi.html?part=userstats").unwrap();
        assert_eq!(
            file_name(Some(&url)),
            "webapi_debug_test.example.com:8080-part=userstats.txt"
        );
        let url = Url::parse("http://test.example.com/oscamapi.html?part=userstats").unwrap();
        assert_eq!(
            file_name(Some(&url)),
            "webapi_debug_test.example.com-part=userstats.txt"
        );
        assert_eq!(file_name(None), "webapi_debug_-.txt");
    }

    #[test]
    fn file_name_never_contains_separators() {
        let url = Url::parse("http://h.example/api?path=/status&win=a\\b").unwrap();
        let name = file_name(Some(&url));
        assert!(!name.contains('/') && !name.contains('\\'), "{}", name);
        assert!(name.starts_with("webapi_debug_h.example-path=_status"));
    }

    #[test]
    fn ports_get_separate_files() {
        let a = Url::parse("http://h.example:8080/?q=1").unwrap();
        let b = Url::parse("http://h.example:8081/?q=1").unwrap();
        assert_ne!(file_name(Some(&a)), file_name(Some(&b)));
    }

    #[test]
    fn query_with_slash_still_creates_a_file() {
        let dir = std::env::temp_dir();
        let url = Url::parse("http://h.example/api?path=/status").unwrap();
        let out = open(&dir, Some(&url));
        assert!(out.is_some());
        drop(out);
        std::fs::remove_file(dir.join(file_name(Some(&url)))).unwrap();
    }

    #[test]
    fn unwritable_directory_disables_the_dump() {
        let dir = std::env::temp_dir().join("webapi-no-such-dir").join("nested");
        assert!(create(&dir, None).is_err());
        assert!(open(&dir, None).is_none());
    }
}
