use crate::record::{Record, Tags};
use std::collections::BTreeMap;

/// Array name → element index for every array enclosing the current branch.
pub type IndexContext = BTreeMap<String, String>;

/// A tag found inside at least one array element.
///
/// It only applies to records produced under the same element(s).
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedTag {
    pub index: IndexContext,
    pub key: String,
    pub value: String,
}

impl ScopedTag {
    /// True when every index recorded with this tag is present on `tags`
    /// with the same value.
    pub fn matches(&self, tags: &Tags) -> bool {
        self.index.iter().all(|(k, v)| tags.get(k) == Some(v))
    }
}

/// Tags discovered during one walk, before they are merged onto records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredTags {
    /// Found outside any array; applied to every record.
    pub global: Tags,
    /// Found inside arrays, in discovery order.
    pub scoped: Vec<ScopedTag>,
}

impl DiscoveredTags {
    pub fn gather(&mut self, key: String, value: String, index: &IndexContext) {
        if index.is_empty() {
            self.global.insert(key, value);
        } else {
            self.scoped.push(ScopedTag {
                index: index.clone(),
                key,
                value,
            });
        }
    }
}

/// Merge caller, global and scoped tags onto every record.
///
/// Later sources win on key collisions: caller tags, then global tags, then
/// each matching scoped tag in discovery order.
pub fn finalize(mut records: Vec<Record>, caller_tags: &Tags, discovered: &DiscoveredTags) -> Vec<Record> {
    for record in &mut records {
        record
            .tags
            .extend(caller_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        record
            .tags
            .extend(discovered.global.iter().map(|(k, v)| (k.clone(), v.clone())));
        for scoped in &discovered.scoped {
            if scoped.matches(&record.tags) {
                record.tags.insert(scoped.key.clone(), scoped.value.clone());
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        let mut r = Record {
            tags: tags(pairs),
            ..Record::default()
        };
        r.fields.insert("x".to_string(), FieldValue::Float(1.0));
        r
    }

    #[test]
    fn gather_splits_global_and_scoped() {
        let mut d = DiscoveredTags::default();
        d.gather("root".to_string(), "r".to_string(), &IndexContext::new());
        d.gather("name".to_string(), "c1".to_string(), &tags(&[("client", "1")]));
        assert_eq!(d.global, tags(&[("root", "r")]));
        assert_eq!(d.scoped.len(), 1);
        assert_eq!(d.scoped[0].index, tags(&[("client", "1")]));
    }

    #[test]
    fn scoped_match_requires_every_index() {
        let t = ScopedTag {
            index: tags(&[("client", "1"), ("ent", "0")]),
            key: "k".to_string(),
            value: "v".to_string(),
        };
        assert!(t.matches(&tags(&[("client", "1"), ("ent", "0"), ("node", "n")])));
        assert!(!t.matches(&tags(&[("client", "1"), ("ent", "1")])));
        assert!(!t.matches(&tags(&[("client", "1")])));
        assert!(!t.matches(&tags(&[("client", "0"), ("ent", "0")])));
    }

    #[test]
    fn finalize_applies_scoped_tags_to_their_element_only() {
        let mut d = DiscoveredTags::default();
        d.gather("name".to_string(), "Client0".to_string(), &tags(&[("client", "0")]));
        d.gather("name".to_string(), "Client1".to_string(), &tags(&[("client", "1")]));
        let out = finalize(
            vec![
                record(&[("client", "0")]),
                record(&[("client", "1"), ("ent", "3")]),
                record(&[]),
            ],
            &Tags::new(),
            &d,
        );
        assert_eq!(out[0].tags.get("name").map(String::as_str), Some("Client0"));
        assert_eq!(out[1].tags.get("name").map(String::as_str), Some("Client1"));
        assert_eq!(out[2].tags.get("name"), None);
    }

    #[test]
    fn finalize_precedence() {
        let mut d = DiscoveredTags::default();
        d.gather("a".to_string(), "global".to_string(), &IndexContext::new());
        d.gather("b".to_string(), "first".to_string(), &tags(&[("i", "0")]));
        d.gather("b".to_string(), "second".to_string(), &tags(&[("i", "0")]));
        let caller = tags(&[("a", "caller"), ("url", "http://x")]);
        let out = finalize(vec![record(&[("i", "0")])], &caller, &d);
        assert_eq!(
            out[0].tags,
            tags(&[("a", "global"), ("b", "second"), ("i", "0"), ("url", "http://x")])
        );
    }
}
