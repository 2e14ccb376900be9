//! Exercises the GIR XML front end (`parser::parse_repository`) directly
//! against small hand-written documents, since it only otherwise runs as
//! part of a full `compile_repository` call.

use std::io::Write;

use gi_typelib_compiler::ir::{NodeData, NodeKind, TypeShape};
use gi_typelib_compiler::parser::parse_repository;

fn write_gir(dir: &tempfile::TempDir, filename: &str, contents: &str) -> std::path::PathBuf {
	let path = dir.path().join(filename);
	let mut file = std::fs::File::create(&path).unwrap();
	file.write_all(contents.as_bytes()).unwrap();
	path
}

#[test]
fn parses_a_function_with_a_basic_parameter_and_return_type() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_gir(
		&dir,
		"Test-1.0.gir",
		r#"<?xml version="1.0"?>
		<repository version="1.2">
			<namespace name="Test" version="1.0">
				<function name="foo" c:identifier="test_foo">
					<return-value transfer-ownership="none">
						<type name="gboolean" c:type="gboolean"/>
					</return-value>
					<parameters>
						<parameter name="x" transfer-ownership="none">
							<type name="gint" c:type="gint"/>
						</parameter>
					</parameters>
				</function>
			</namespace>
		</repository>"#,
	);

	let module = parse_repository(&path, &[]).unwrap();
	assert_eq!(module.name, "Test");
	assert_eq!(module.entries.len(), 1);

	let node = module.node(module.entries[0]);
	assert_eq!(node.kind, NodeKind::Function);
	match &node.data {
		NodeData::Function(f) => assert_eq!(f.parameters.len(), 1),
		other => panic!("expected a Function node, got {other:?}"),
	}
}

#[test]
fn non_introspectable_function_is_skipped_but_field_degrades_to_gpointer() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_gir(
		&dir,
		"Test-1.0.gir",
		r#"<?xml version="1.0"?>
		<repository version="1.2">
			<namespace name="Test" version="1.0">
				<function name="hidden" c:identifier="test_hidden" introspectable="0">
					<return-value transfer-ownership="none">
						<type name="none" c:type="void"/>
					</return-value>
				</function>
				<record name="Opaque" c:type="TestOpaque" introspectable="0">
					<field name="dummy">
						<type name="gint" c:type="gint"/>
					</field>
				</record>
				<record name="Holder" c:type="TestHolder">
					<field name="opaque">
						<type name="Opaque" c:type="TestOpaque*"/>
					</field>
				</record>
			</namespace>
		</repository>"#,
	);

	let module = parse_repository(&path, &[]).unwrap();
	assert!(module.entries.iter().all(|&id| module.node(id).name.as_deref() != Some("hidden")), "a non-introspectable function must not produce an entry");

	let holder = module.entries.iter().find(|&&id| module.node(id).name.as_deref() == Some("Holder")).expect("Holder record must still be parsed");
	let members = match &module.node(*holder).data {
		NodeData::Struct(r) => &r.members,
		other => panic!("expected a Struct node, got {other:?}"),
	};
	let field_id = members[0];
	let field = match &module.node(field_id).data {
		NodeData::Field(f) => f,
		other => panic!("expected a Field node, got {other:?}"),
	};
	let type_id = match field.shape {
		gi_typelib_compiler::ir::FieldShape::Type(t) => t,
		_ => panic!("expected a plainly-typed field"),
	};
	match &module.node(type_id).data {
		NodeData::Type(t) => assert!(matches!(t.shape, TypeShape::Basic(gi_typelib_compiler::ir::BasicTypeTag::Void)), "a field typed by a non-introspectable record must degrade to gpointer"),
		other => panic!("expected a Type node, got {other:?}"),
	}
}

#[test]
fn disguised_record_is_recorded_in_the_disguised_structures_table() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_gir(
		&dir,
		"Test-1.0.gir",
		r#"<?xml version="1.0"?>
		<repository version="1.2">
			<namespace name="Test" version="1.0">
				<record name="Handle" c:type="TestHandle" disguised="1">
				</record>
			</namespace>
		</repository>"#,
	);

	let module = parse_repository(&path, &[]).unwrap();
	assert!(module.is_pointer_or_disguised("Handle"));
}

#[test]
fn alias_is_resolved_to_its_underlying_basic_type() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_gir(
		&dir,
		"Test-1.0.gir",
		r#"<?xml version="1.0"?>
		<repository version="1.2">
			<namespace name="Test" version="1.0">
				<alias name="Size" c:type="TestSize">
					<type name="guint" c:type="guint"/>
				</alias>
				<function name="use_size" c:identifier="test_use_size">
					<return-value transfer-ownership="none">
						<type name="none" c:type="void"/>
					</return-value>
					<parameters>
						<parameter name="size" transfer-ownership="none">
							<type name="Size" c:type="TestSize"/>
						</parameter>
					</parameters>
				</function>
			</namespace>
		</repository>"#,
	);

	let module = parse_repository(&path, &[]).unwrap();
	assert_eq!(module.resolve_alias("Size"), "guint");
}

#[test]
fn malformed_xml_is_reported_as_a_parse_error() {
	let dir = tempfile::tempdir().unwrap();
	let path = write_gir(&dir, "Broken-1.0.gir", "<repository><namespace name=\"Broken\" version=\"1.0\">");

	let err = parse_repository(&path, &[]).unwrap_err();
	assert!(matches!(err, gi_typelib_compiler::error::CompileError::Parse { .. }));
}
