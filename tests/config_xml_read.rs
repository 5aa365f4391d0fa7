//! Loading and validating the XML configuration.

use shunt::config::{build_route_table, load_config};
use shunt::{Condition, LogLevel};
use std::fs;
use std::path::PathBuf;

fn write_config(dir: &std::path::Path, body: &str) -> PathBuf {
    let path = dir.join("config.xml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn loads_full_config() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("incoming");
    let archive = tmp.path().join("archive");
    fs::create_dir_all(&source).unwrap();

    let xml = format!(
        r#"<config>
  <source_base>{}</source_base>
  <log_level>debug</log_level>
  <scan_depth>2</scan_depth>
  <destinations>
    <destination name="archive" path="{}"/>
  </destinations>
  <routes>
    <route name="csv" destination="archive" dest_dir="csv" condition="not_exists"
           filter="extension" pattern="csv" preserve_time="true"/>
  </routes>
</config>
"#,
        source.display(),
        archive.display()
    );
    let cfg_path = write_config(tmp.path(), &xml);

    let cfg = load_config(Some(&cfg_path)).unwrap().expect("config present");
    assert_eq!(cfg.source_base, source);
    assert_eq!(cfg.log_level, LogLevel::Debug);
    assert_eq!(cfg.scan_depth, 2);
    assert_eq!(cfg.destinations.len(), 1);
    assert_eq!(cfg.routes.len(), 1);
    assert_eq!(cfg.routes[0].condition.as_deref(), Some("not_exists"));
    assert!(cfg.routes[0].preserve_time);

    let (_source, table) = build_route_table(&cfg).unwrap();
    assert!(archive.is_dir(), "destination directory created at build");
    assert_eq!(table.routes().len(), 1);
    assert_eq!(table.routes()[0].condition(), Condition::NotExists);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = load_config(Some(&tmp.path().join("nope.xml"))).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn malformed_xml_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = write_config(tmp.path(), "<config><routes></config>");
    assert!(load_config(Some(&cfg_path)).is_err());
}

#[test]
fn unknown_field_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg_path = write_config(tmp.path(), "<config><sourcebase>/x</sourcebase></config>");
    assert!(load_config(Some(&cfg_path)).is_err());
}

#[test]
fn route_without_condition_fails_at_build_with_route_name() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("incoming");
    fs::create_dir_all(&source).unwrap();

    let xml = format!(
        r#"<config>
  <source_base>{}</source_base>
  <destinations>
    <destination name="archive" path="{}"/>
  </destinations>
  <routes>
    <route name="forgot-policy" destination="archive" filter="any"/>
  </routes>
</config>
"#,
        source.display(),
        tmp.path().join("archive").display()
    );
    let cfg_path = write_config(tmp.path(), &xml);

    let cfg = load_config(Some(&cfg_path)).unwrap().unwrap();
    let err = build_route_table(&cfg).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("forgot-policy"), "message was: {msg}");
    assert!(msg.contains("no condition"), "message was: {msg}");
}

#[test]
fn bad_condition_name_fails_at_build() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("incoming");
    fs::create_dir_all(&source).unwrap();

    let xml = format!(
        r#"<config>
  <source_base>{}</source_base>
  <destinations>
    <destination name="archive" path="{}"/>
  </destinations>
  <routes>
    <route name="typo" destination="archive" filter="any" condition="if_newer"/>
  </routes>
</config>
"#,
        source.display(),
        tmp.path().join("archive").display()
    );
    let cfg_path = write_config(tmp.path(), &xml);

    let cfg = load_config(Some(&cfg_path)).unwrap().unwrap();
    let err = build_route_table(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("if_newer"));
}
