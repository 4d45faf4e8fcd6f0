use crate::measurement::Measurement;
use crate::record::FieldValue;

/// Output format of the command-line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// InfluxDB line protocol, one measurement per line.
    #[default]
    Line,
    /// A JSON array of `{name, tags, fields}` objects.
    Json,
}

struct LineWriter {
    buf: String,
}

impl LineWriter {
    fn new() -> Self {
        LineWriter { buf: String::new() }
    }

    /// Append one line; measurements with no writable field are skipped.
    fn write_measurement(&mut self, m: &Measurement, timestamp: Option<i64>) {
        let fields: Vec<_> = m
            .fields
            .iter()
            .filter(|(_, v)| !matches!(v, FieldValue::Float(f) if !f.is_finite()))
            .collect();
        if fields.is_empty() {
            return;
        }

        self.write_escaped(&m.name, &[',', ' ']);
        for (key, value) in &m.tags {
            if key.is_empty() || value.is_empty() {
                continue;
            }
            self.buf.push(',');
            self.write_escaped(key, &[',', '=', ' ']);
            self.buf.push('=');
            self.write_escaped(value, &[',', '=', ' ']);
        }

        for (i, (key, value)) in fields.into_iter().enumerate() {
            self.buf.push(if i == 0 { ' ' } else { ',' });
            self.write_escaped(key, &[',', '=', ' ']);
            self.buf.push('=');
            self.write_field_value(value);
        }

        if let Some(ts) = timestamp {
            self.buf.push(' ');
            self.buf.push_str(&ts.to_string());
        }
        self.buf.push('\n');
    }

    fn write_field_value(&mut self, value: &FieldValue) {
        match value {
            FieldValue::Float(f) => self.buf.push_str(&f.to_string()),
            FieldValue::Integer(i) => {
                self.buf.push_str(&i.to_string());
                self.buf.push('i');
            }
            FieldValue::Boolean(b) => self.buf.push_str(if *b { "true" } else { "false" }),
        }
    }

    fn write_escaped(&mut self, s: &str, special: &[char]) {
        for ch in s.chars() {
            if special.contains(&ch) {
                self.buf.push('\\');
            }
            self.buf.push(ch);
        }
    }
}

/// Serialize measurements to InfluxDB line protocol.
///
/// `timestamp` is in nanoseconds; without it the receiver stamps each line.
pub fn to_line_protocol(measurements: &[Measurement], timestamp: Option<i64>) -> String {
    let mut w = LineWriter::new();
    for m in measurements {
        w.write_measurement(m, timestamp);
    }
    w.buf
}

/// Serialize measurements to a JSON array.
pub fn to_json(measurements: &[Measurement]) -> serde_json::Result<String> {
    serde_json::to_string(measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Fields, Tags};

    fn measurement(name: &str, tags: &[(&str, &str)], fields: &[(&str, FieldValue)]) -> Measurement {
        Measurement {
            name: name.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Tags>(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<Fields>(),
        }
    }

    #[test]
    fn writes_tags_and_typed_fields() {
        let m = measurement(
            "webapi_oscam",
            &[("node", "oscam__status__client"), ("client", "0")],
            &[
                ("thid", FieldValue::Float(90.0)),
                ("caid", FieldValue::Integer(3111)),
                ("up", FieldValue::Boolean(true)),
                ("load", FieldValue::Float(0.5)),
            ],
        );
        assert_eq!(
            to_line_protocol(&[m], Some(1_700_000_000_000_000_000)),
            "webapi_oscam,client=0,node=oscam__status__client caid=3111i,load=0.5,thid=90,up=true 1700000000000000000\n"
        );
    }

    #[test]
    fn escapes_special_characters() {
        let m = measurement(
            "web api,x",
            &[("server name", "a=b,c")],
            &[("a b", FieldValue::Float(1.5))],
        );
        assert_eq!(
            to_line_protocol(&[m], None),
            "web\\ api\\,x,server\\ name=a\\=b\\,c a\\ b=1.5\n"
        );
    }

    #[test]
    fn backslashes_are_written_verbatim() {
        let m = measurement(
            "m",
            &[("path", "C:\\data\\a b")],
            &[("x\\y", FieldValue::Integer(1))],
        );
        assert_eq!(
            to_line_protocol(&[m], None),
            "m,path=C:\\data\\a\\ b x\\y=1i\n"
        );
    }

    #[test]
    fn skips_empty_tags_and_unwritable_fields() {
        let empty_tag = measurement("m", &[("k", ""), ("node", "__")], &[("v", FieldValue::Integer(-2))]);
        let nan_only = measurement("m", &[], &[("v", FieldValue::Float(f64::NAN))]);
        let mixed = measurement(
            "m",
            &[],
            &[("a", FieldValue::Float(f64::INFINITY)), ("b", FieldValue::Float(2.0))],
        );
        assert_eq!(
            to_line_protocol(&[empty_tag, nan_only, mixed], None),
            "m,node=__ v=-2i\nm b=2\n"
        );
    }

    #[test]
    fn json_output() {
        let m = measurement(
            "webapi",
            &[("node", "__")],
            &[("a", FieldValue::Integer(3)), ("b", FieldValue::Float(1.5))],
        );
        assert_eq!(
            to_json(&[m]).unwrap(),
            r#"[{"name":"webapi","tags":{"node":"__"},"fields":{"a":3,"b":1.5}}]"#
        );
    }
}
