use crate::error::{Error, Result};
use crate::record::{FieldValue, Fields, Record, Tags};
use serde::Serialize;
use url::Url;

pub const MEASUREMENT_PREFIX: &str = "webapi";

/// Field carrying how long the source took to answer, in seconds.
pub const RESPONSE_TIME_FIELD: &str = "response_time";

pub const URL_TAG: &str = "url";
pub const SERVER_TAG: &str = "server";

/// `webapi`, or `webapi_<name>` for a named source.
pub fn measurement_name(name: &str) -> String {
    if name.is_empty() {
        MEASUREMENT_PREFIX.to_string()
    } else {
        format!("{}_{}", MEASUREMENT_PREFIX, name)
    }
}

pub fn parse_source(source: &str) -> Result<Url> {
    Url::parse(source).map_err(|e| Error::InvalidSourceUrl {
        url: source.to_string(),
        source: e,
    })
}

/// Tags identifying the source a document was fetched from.
pub fn source_tags(url: &Url) -> Tags {
    let mut tags = Tags::new();
    tags.insert(URL_TAG.to_string(), url.as_str().to_string());
    if let Some(host) = url.host_str() {
        let server = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        tags.insert(SERVER_TAG.to_string(), server);
    }
    tags
}

/// A named record ready to be written out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    pub tags: Tags,
    pub fields: Fields,
}

impl Measurement {
    /// Name every record and, when known, add the response time to it.
    pub fn from_records(name: &str, records: Vec<Record>, response_time: Option<f64>) -> Vec<Measurement> {
        let name = measurement_name(name);
        records
            .into_iter()
            .map(|record| {
                let mut fields = record.fields;
                if let Some(seconds) = response_time {
                    fields.insert(RESPONSE_TIME_FIELD.to_string(), FieldValue::Float(seconds));
                }
                Measurement {
                    name: name.clone(),
                    tags: record.tags,
                    fields,
                }
            })
            .collect()
    }
}
