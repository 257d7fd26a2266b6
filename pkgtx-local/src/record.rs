use winnow::ascii::till_line_ending;
use winnow::combinator::{delimited, repeat, terminated};
use winnow::token::take_while;
use winnow::{ModalResult, Parser};

use pkgtx_types::{Feature, Name, Version};

use crate::error::LPSError;

/// A single installed package, as stored in a [`crate::FileLps`] database.
///
/// Serialized as a keyed-section text record, in the same `%SECTION%` style
/// as the teacher workspace's own ALPM `desc` format, reduced to the fields
/// this engine's LPS contract actually needs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstalledRecord {
    /// The installed package's name.
    pub name: Name,
    /// The installed version.
    pub version: Version,
    /// Features (including owned file paths) this package provides.
    pub provides: Vec<Feature>,
    /// Names/features this package requires.
    pub requires: Vec<Feature>,
    /// Paths this package owns.
    pub files: Vec<String>,
}

fn section_name<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    delimited('%', take_while(1.., |c: char| c != '%' && c != '\n'), '%').parse_next(input)
}

fn section_line<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    terminated(till_line_ending, '\n').parse_next(input)
}

fn section_values(input: &mut &str) -> ModalResult<Vec<String>> {
    let mut values = Vec::new();
    loop {
        if input.is_empty() || input.starts_with('%') {
            break;
        }
        let line = section_line.parse_next(input)?;
        if line.is_empty() {
            break;
        }
        values.push(line.to_string());
    }
    Ok(values)
}

fn one_section(input: &mut &str) -> ModalResult<(String, Vec<String>)> {
    let name = terminated(section_name, '\n').parse_next(input)?;
    let values = section_values(input)?;
    Ok((name.to_string(), values))
}

fn sections(input: &mut &str) -> ModalResult<Vec<(String, Vec<String>)>> {
    repeat(0.., one_section).parse_next(input)
}

/// Serializes `record` into the `%SECTION%` record text format.
pub fn write_record(record: &InstalledRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("%NAME%\n{}\n\n", record.name));
    out.push_str(&format!("%VERSION%\n{}\n\n", record.version));
    if !record.provides.is_empty() {
        out.push_str("%PROVIDES%\n");
        for feature in &record.provides {
            out.push_str(feature.as_str());
            out.push('\n');
        }
        out.push('\n');
    }
    if !record.requires.is_empty() {
        out.push_str("%REQUIRES%\n");
        for feature in &record.requires {
            out.push_str(feature.as_str());
            out.push('\n');
        }
        out.push('\n');
    }
    if !record.files.is_empty() {
        out.push_str("%FILES%\n");
        for file in &record.files {
            out.push_str(file);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Parses an [`InstalledRecord`] from the `%SECTION%` record text format.
pub fn parse_record(text: &str) -> Result<InstalledRecord, LPSError> {
    let mut input = text;
    let parsed = sections(&mut input).map_err(|e| LPSError::MalformedRecord("<record>".to_string(), e.to_string()))?;

    let mut name = None;
    let mut version = None;
    let mut provides = Vec::new();
    let mut requires = Vec::new();
    let mut files = Vec::new();

    for (section, values) in parsed {
        match section.as_str() {
            "NAME" => name = values.into_iter().next(),
            "VERSION" => version = values.into_iter().next(),
            "PROVIDES" => {
                for v in values {
                    provides.push(Feature::new(v).map_err(|e| LPSError::MalformedRecord("PROVIDES".to_string(), e.to_string()))?);
                }
            }
            "REQUIRES" => {
                for v in values {
                    requires.push(Feature::new(v).map_err(|e| LPSError::MalformedRecord("REQUIRES".to_string(), e.to_string()))?);
                }
            }
            "FILES" => files = values,
            _ => {}
        }
    }

    let name = name.ok_or_else(|| LPSError::MalformedRecord("record".to_string(), "missing %NAME%".to_string()))?;
    let version = version.ok_or_else(|| LPSError::MalformedRecord("record".to_string(), "missing %VERSION%".to_string()))?;
    let name = Name::new(name).map_err(|e| LPSError::MalformedRecord("NAME".to_string(), e.to_string()))?;
    let version = Version::new(version).map_err(|e| LPSError::MalformedRecord("VERSION".to_string(), e.to_string()))?;

    Ok(InstalledRecord {
        name,
        version,
        provides,
        requires,
        files,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trips_a_full_record() {
        let record = InstalledRecord {
            name: Name::new("libfoo").unwrap(),
            version: Version::new("1.0-2").unwrap(),
            provides: vec![Feature::new("libfoo").unwrap(), Feature::new("/usr/lib/libfoo.so").unwrap()],
            requires: vec![Feature::new("libc").unwrap()],
            files: vec!["/usr/lib/libfoo.so".to_string(), "/usr/include/foo.h".to_string()],
        };
        let text = write_record(&record);
        let parsed = parse_record(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn minimal_record_parses() {
        let text = "%NAME%\nminimal\n\n%VERSION%\n1.0\n\n";
        let parsed = parse_record(text).unwrap();
        assert_eq!(parsed.name.as_str(), "minimal");
        assert!(parsed.provides.is_empty());
    }

    #[test]
    fn missing_name_is_rejected() {
        let text = "%VERSION%\n1.0\n\n";
        assert!(parse_record(text).is_err());
    }
}
