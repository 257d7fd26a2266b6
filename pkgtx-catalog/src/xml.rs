use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::CatalogError;

/// A raw, not-yet-interpreted node of the §6.1 catalog descriptor tree.
///
/// Mirrors the `Package` element (and its recursive `soft_depend`,
/// `hard_depend`, `breaks`, `modifies` children, each of which is itself a
/// `Package`-shaped element) exactly as received on the wire, before it is
/// turned into a [`crate::FilledRef`] or fed into the resolver. Missing
/// optional fields default per §6.1: `bytesize` to 0, `status`/`modstatus`
/// to `None` (meaning `UNKNOWN`), and the dependency/breaks/modifies lists
/// to empty.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CatalogPackage {
    /// The package's name.
    pub name: String,
    /// The package's version string.
    pub version: String,
    /// Minor/patch qualifier.
    pub minor: Option<String>,
    /// Target architecture.
    pub arch: Option<String>,
    /// Package size in bytes; defaults to 0 if absent.
    pub bytesize: u64,
    /// One-line human-readable summary.
    pub summary: Option<String>,
    /// Resolution status, if the descriptor carries one (e.g. in a
    /// journal).
    pub status: Option<String>,
    /// Modification status, if the descriptor carries one (e.g. in a
    /// journal's `Transaction`).
    pub modstatus: Option<String>,
    /// The relational sense of this node, when it appears as a dependency
    /// child (`soft_depend`/`hard_depend`). Defaults to `">="` when absent.
    pub sense: Option<String>,
    /// Optional dependencies.
    pub soft_depend: Vec<CatalogPackage>,
    /// Required dependencies.
    pub hard_depend: Vec<CatalogPackage>,
    /// Packages this one breaks.
    pub breaks: Vec<CatalogPackage>,
    /// Packages this one modifies (replaces).
    pub modifies: Vec<CatalogPackage>,
}

/// A `Category` element: a name and an ordered sequence of packages.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CatalogCategory {
    /// The category's display name.
    pub name: String,
    /// The packages belonging to this category, in document order.
    pub packages: Vec<CatalogPackage>,
}

fn attr_value(start: &BytesStart<'_>, key: &str) -> Result<Option<String>, CatalogError> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| CatalogError::BadResponse(e.to_string()))?;
        if attribute.key.as_ref() == key.as_bytes() {
            let value = attribute.unescape_value().map_err(|e| CatalogError::BadResponse(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_package_attrs(start: &BytesStart<'_>) -> Result<CatalogPackage, CatalogError> {
    let name = attr_value(start, "name")?.unwrap_or_default();
    let version = attr_value(start, "version")?.unwrap_or_default();
    let bytesize = attr_value(start, "bytesize")?
        .map(|v| v.parse::<u64>().map_err(|e| CatalogError::BadResponse(e.to_string())))
        .transpose()?
        .unwrap_or(0);
    Ok(CatalogPackage {
        name,
        version,
        minor: attr_value(start, "minor")?,
        arch: attr_value(start, "arch")?,
        bytesize,
        summary: attr_value(start, "summary")?,
        status: attr_value(start, "status")?,
        modstatus: attr_value(start, "modstatus")?,
        sense: attr_value(start, "sense")?,
        soft_depend: Vec::new(),
        hard_depend: Vec::new(),
        breaks: Vec::new(),
        modifies: Vec::new(),
    })
}

/// Parses a `Package`-shaped element (or one of its recursive-child
/// variants) starting at the already-consumed opening tag `start`, reading
/// `reader` up to and including the matching end tag.
fn parse_package_body(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<CatalogPackage, CatalogError> {
    let mut package = parse_package_attrs(start)?;
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
        match event {
            Event::Start(child) => {
                let tag = child.name().as_ref().to_vec();
                let child_owned = child.to_owned();
                let parsed = parse_package_body(reader, &child_owned)?;
                bucket_child(&mut package, &tag, parsed);
            }
            Event::Empty(child) => {
                let tag = child.name().as_ref().to_vec();
                let parsed = parse_package_attrs(&child)?;
                bucket_child(&mut package, &tag, parsed);
            }
            Event::End(_) => break,
            Event::Eof => return Err(CatalogError::BadResponse("unexpected end of document".to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(package)
}

fn bucket_child(package: &mut CatalogPackage, tag: &[u8], parsed: CatalogPackage) {
    match tag {
        b"soft_depend" => package.soft_depend.push(parsed),
        b"hard_depend" => package.hard_depend.push(parsed),
        b"breaks" => package.breaks.push(parsed),
        b"modifies" => package.modifies.push(parsed),
        _ => {
            // Unknown elements (and their subtrees) are ignored per §6.1.
        }
    }
}

/// Parses a complete `Categories` document into an ordered list of
/// categories.
pub fn parse_categories(xml: &str) -> Result<Vec<CatalogCategory>, CatalogError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;
    let mut buf = Vec::new();
    let mut categories = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
        match event {
            Event::Start(tag) if tag.name().as_ref() == b"Category" => {
                let name = attr_value(&tag, "name")?.unwrap_or_default();
                let category = parse_category_body(&mut reader, name)?;
                categories.push(category);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(categories)
}

fn parse_category_body(reader: &mut Reader<&[u8]>, name: String) -> Result<CatalogCategory, CatalogError> {
    let mut category = CatalogCategory { name, packages: Vec::new() };
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
        match event {
            Event::Start(tag) if tag.name().as_ref() == b"Package" => {
                let owned = tag.to_owned();
                category.packages.push(parse_package_body(reader, &owned)?);
            }
            Event::Empty(tag) if tag.name().as_ref() == b"Package" => {
                category.packages.push(parse_package_attrs(&tag)?);
            }
            Event::End(tag) if tag.name().as_ref() == b"Category" => break,
            Event::Eof => return Err(CatalogError::BadResponse("unexpected end of document".to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(category)
}

/// Parses a single standalone `Package` document, e.g. the sidecar
/// descriptor of a local package file.
pub fn parse_single_package(xml: &str) -> Result<CatalogPackage, CatalogError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
        match event {
            Event::Start(tag) if tag.name().as_ref() == b"Package" => {
                let owned = tag.to_owned();
                return parse_package_body(&mut reader, &owned);
            }
            Event::Empty(tag) if tag.name().as_ref() == b"Package" => {
                return parse_package_attrs(&tag);
            }
            Event::Eof => return Err(CatalogError::BadResponse("no Package element found".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

fn write_package(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, package: &CatalogPackage) -> Result<(), CatalogError> {
    let mut start = BytesStart::new(tag);
    start.push_attribute(("name", package.name.as_str()));
    start.push_attribute(("version", package.version.as_str()));
    if let Some(minor) = &package.minor {
        start.push_attribute(("minor", minor.as_str()));
    }
    if let Some(arch) = &package.arch {
        start.push_attribute(("arch", arch.as_str()));
    }
    if package.bytesize != 0 {
        start.push_attribute(("bytesize", package.bytesize.to_string().as_str()));
    }
    if let Some(summary) = &package.summary {
        start.push_attribute(("summary", summary.as_str()));
    }
    if let Some(status) = &package.status {
        start.push_attribute(("status", status.as_str()));
    }
    if let Some(modstatus) = &package.modstatus {
        start.push_attribute(("modstatus", modstatus.as_str()));
    }
    if let Some(sense) = &package.sense {
        start.push_attribute(("sense", sense.as_str()));
    }

    let has_children = !package.soft_depend.is_empty()
        || !package.hard_depend.is_empty()
        || !package.breaks.is_empty()
        || !package.modifies.is_empty();

    if !has_children {
        writer.write_event(Event::Empty(start)).map_err(|e| CatalogError::BadResponse(e.to_string()))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    for child in &package.soft_depend {
        write_package(writer, "soft_depend", child)?;
    }
    for child in &package.hard_depend {
        write_package(writer, "hard_depend", child)?;
    }
    for child in &package.breaks {
        write_package(writer, "breaks", child)?;
    }
    for child in &package.modifies {
        write_package(writer, "modifies", child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    Ok(())
}

/// Serializes `categories` back into a `Categories` document.
pub fn write_categories(categories: &[CatalogCategory]) -> Result<String, CatalogError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Start(BytesStart::new("Categories")))
        .map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    for category in categories {
        let mut start = BytesStart::new("Category");
        start.push_attribute(("name", category.name.as_str()));
        writer
            .write_event(Event::Start(start))
            .map_err(|e| CatalogError::BadResponse(e.to_string()))?;
        for package in &category.packages {
            write_package(&mut writer, "Package", package)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("Category")))
            .map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("Categories")))
        .map_err(|e| CatalogError::BadResponse(e.to_string()))?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| CatalogError::BadResponse(e.to_string()))
}

/// Serializes a single `Package` document, e.g. for a local sidecar
/// descriptor.
pub fn write_single_package(package: &CatalogPackage) -> Result<String, CatalogError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_package(&mut writer, "Package", package)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| CatalogError::BadResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use rstest::rstest;

    use super::*;

    #[test]
    fn rendered_package_xml_round_trips_to_the_same_shape() {
        let package = CatalogPackage {
            name: "libfoo".to_string(),
            version: "1.0".to_string(),
            bytesize: 2048,
            hard_depend: vec![CatalogPackage {
                name: "libbar".to_string(),
                version: "2.0".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let xml = write_single_package(&package).unwrap();
        let reparsed = parse_single_package(&xml).unwrap();
        let summary = format!(
            "{}-{} bytesize={} hard_depend={:?}",
            reparsed.name,
            reparsed.version,
            reparsed.bytesize,
            reparsed.hard_depend.iter().map(|d| d.name.as_str()).collect::<Vec<_>>()
        );
        assert_snapshot!(summary, @r###"libfoo-1.0 bytesize=2048 hard_depend=["libbar"]"###);
    }

    #[rstest]
    #[case(r#"<Package name="x" version="1"/>"#, "x", "1")]
    #[case(r#"<Package name="libfoo-dev" version="2.0" arch="x86_64"/>"#, "libfoo-dev", "2.0")]
    fn parses_assorted_single_package_documents(#[case] xml: &str, #[case] name: &str, #[case] version: &str) {
        let pkg = parse_single_package(xml).unwrap();
        assert_eq!(pkg.name, name);
        assert_eq!(pkg.version, version);
    }

    #[test]
    fn round_trips_a_simple_category() {
        let xml = r#"<Categories>
  <Category name="Base">
    <Package name="libfoo" version="1.0" bytesize="2048">
      <hard_depend name="libbar" version="2.0"/>
    </Package>
  </Category>
</Categories>"#;
        let categories = parse_categories(xml).unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Base");
        assert_eq!(categories[0].packages.len(), 1);
        let pkg = &categories[0].packages[0];
        assert_eq!(pkg.name, "libfoo");
        assert_eq!(pkg.version, "1.0");
        assert_eq!(pkg.bytesize, 2048);
        assert_eq!(pkg.hard_depend.len(), 1);
        assert_eq!(pkg.hard_depend[0].name, "libbar");

        let rewritten = write_categories(&categories).unwrap();
        let reparsed = parse_categories(&rewritten).unwrap();
        assert_eq!(reparsed, categories);
    }

    #[test]
    fn missing_optional_fields_default_per_spec() {
        let xml = r#"<Categories><Category name="Empty"><Package name="x" version="1"/></Category></Categories>"#;
        let categories = parse_categories(xml).unwrap();
        let pkg = &categories[0].packages[0];
        assert_eq!(pkg.bytesize, 0);
        assert_eq!(pkg.status, None);
        assert_eq!(pkg.modstatus, None);
        assert!(pkg.hard_depend.is_empty());
        assert!(pkg.soft_depend.is_empty());
    }

    #[test]
    fn unknown_elements_are_ignored() {
        let xml = r#"<Categories><Category name="C"><Package name="x" version="1"><mystery foo="bar"/></Package></Category></Categories>"#;
        let categories = parse_categories(xml).unwrap();
        let pkg = &categories[0].packages[0];
        assert!(pkg.hard_depend.is_empty());
        assert!(pkg.soft_depend.is_empty());
        assert!(pkg.breaks.is_empty());
        assert!(pkg.modifies.is_empty());
    }

    #[test]
    fn parses_single_package_document() {
        let xml = r#"<Package name="local-pkg" version="3.1" arch="i386"/>"#;
        let pkg = parse_single_package(xml).unwrap();
        assert_eq!(pkg.name, "local-pkg");
        assert_eq!(pkg.arch.as_deref(), Some("i386"));
    }
}
