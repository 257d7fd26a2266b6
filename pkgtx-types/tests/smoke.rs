use pkgtx_types::{compare_version_strings, make_ref, ref_readable_name, Name, Version};
use std::cmp::Ordering;
use testresult::TestResult;

#[test]
fn make_ref_with_only_name_is_not_filled() -> TestResult {
    let name = Name::new("app")?;
    let package = make_ref(Some(name), None, None, None, None);
    assert_eq!(ref_readable_name(&package), "app");
    assert!(!package.is_filled());
    Ok(())
}

#[test]
fn version_ordering_is_consistent_with_compare_version_strings() -> TestResult {
    let a = Version::new("1.2.0")?;
    let b = Version::new("1.10.0")?;
    assert_eq!(a.cmp(&b), Ordering::Less);
    assert_eq!(compare_version_strings(a.as_str(), b.as_str()), Ordering::Less);
    Ok(())
}
