//! End-to-end emission tests driving the public pipeline and inspecting the
//! produced physical metadata bytes.

use dotforge::prelude::*;
use uguid::Guid;

/// Locates a stream's bytes within an emitted metadata region.
fn find_stream<'a>(metadata: &'a [u8], name: &str) -> Option<&'a [u8]> {
    assert_eq!(&metadata[..4], b"BSJB");
    let count = u16::from_le_bytes(metadata[30..32].try_into().unwrap()) as usize;
    let mut pos = 32;
    for _ in 0..count {
        let offset = u32::from_le_bytes(metadata[pos..pos + 4].try_into().unwrap()) as usize;
        let size = u32::from_le_bytes(metadata[pos + 4..pos + 8].try_into().unwrap()) as usize;
        pos += 8;
        let start = pos;
        while metadata[pos] != 0 {
            pos += 1;
        }
        let entry_name = std::str::from_utf8(&metadata[start..pos]).unwrap();
        pos = (pos + 1 + 3) & !3;
        if entry_name == name {
            return Some(&metadata[offset..offset + size]);
        }
    }
    None
}

/// Row counts of the present tables, keyed by table id, from a tables stream.
fn parse_row_counts(tables: &[u8]) -> std::collections::HashMap<u8, u32> {
    let valid = u64::from_le_bytes(tables[8..16].try_into().unwrap());
    let mut counts = std::collections::HashMap::new();
    let mut pos = 24;
    for id in 0u8..64 {
        if valid & (1u64 << id) != 0 {
            counts.insert(
                id,
                u32::from_le_bytes(tables[pos..pos + 4].try_into().unwrap()),
            );
            pos += 4;
        }
    }
    counts
}

fn simple_module() -> ModuleData {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    let ty = module.add_type(TypeDefData::new("N", "C", 0x0010_0001));
    module.add_field(ty, FieldData::new("F", 0x0006, TypeSig::I4));
    module.add_method(
        ty,
        MethodData::new("M", 0x0086, MethodSignature::instance_void()),
    );
    module
}

#[test]
fn single_type_with_members_produces_expected_rows() {
    let module = simple_module();
    let mut buffers = MetadataBuffers::default();
    let summary = MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    assert_eq!(summary.row_counts[TableId::Module as usize], 1);
    assert_eq!(summary.row_counts[TableId::TypeDef as usize], 1);
    assert_eq!(summary.row_counts[TableId::Field as usize], 1);
    assert_eq!(summary.row_counts[TableId::MethodDef as usize], 1);
    assert_eq!(summary.row_counts[TableId::Param as usize], 0);

    let tables = find_stream(&buffers.metadata, "#~").unwrap();
    let counts = parse_row_counts(tables);
    assert_eq!(counts[&0x00], 1);
    assert_eq!(counts[&0x02], 1);
    assert_eq!(counts[&0x04], 1);
    assert_eq!(counts[&0x06], 1);
    assert!(!counts.contains_key(&0x08));

    // Four present tables, all indices 2 bytes, heaps small. The TypeDef row
    // follows the 10-byte Module row: flags u32, name, namespace, extends,
    // then FieldList and MethodList both pointing at row 1.
    let rows = 24 + 4 * counts.len();
    let type_def = rows + 10;
    let field_list = u16::from_le_bytes(tables[type_def + 10..type_def + 12].try_into().unwrap());
    let method_list = u16::from_le_bytes(tables[type_def + 12..type_def + 14].try_into().unwrap());
    assert_eq!(field_list, 1);
    assert_eq!(method_list, 1);

    // Heap-size flags byte: everything small.
    assert_eq!(tables[6], 0);
}

#[test]
fn emission_is_byte_identical_across_runs() {
    let mvid = Guid::from_bytes([7u8; 16]);
    let build = || {
        let mut module = ModuleData::new("demo.dll", mvid);
        let corelib = module.add_assembly_ref(AssemblyRefData {
            name: "mscorlib".to_string(),
            version: (4, 0, 0, 0),
            flags: 0,
            public_key_or_token: vec![0xB7, 0x7A, 0x5C, 0x56, 0x19, 0x34, 0xE0, 0x89],
            culture: String::new(),
            hash_value: Vec::new(),
        });
        let object = module.add_type_ref(TypeRefData {
            scope: ResolutionScope::Assembly(corelib),
            namespace: "System".to_string(),
            name: "Object".to_string(),
        });
        let mut ty = TypeDefData::new("N", "C", 0x0010_0001);
        ty.extends = Some(TypeDefOrRef::Reference(object));
        let ty = module.add_type(ty);
        module.add_field(ty, FieldData::new("value", 0x0001, TypeSig::String));
        let mut method = MethodData::new("Run", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
        method.body = Some(MethodBodyData {
            il: vec![0x2A],
            max_stack: 8,
            init_locals: false,
            locals: Vec::new(),
            exception_regions: Vec::new(),
        });
        module.add_method(ty, method);
        module
    };

    let first_module = build();
    let mut first = MetadataBuffers::default();
    MetadataAssembler::new(&first_module).assemble(&mut first).unwrap();

    let second_module = build();
    let mut second = MetadataBuffers::default();
    MetadataAssembler::new(&second_module).assemble(&mut second).unwrap();

    assert_eq!(first.metadata, second.metadata);
    assert_eq!(first.il, second.il);
}

#[test]
fn nested_types_emit_nested_class_rows_after_enclosing() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    let outer = module.add_type(TypeDefData::new("N", "Outer", 0x0010_0001));
    let inner = module.add_nested_type(outer, TypeDefData::new("", "Inner", 0x0000_0002));
    module.add_nested_type(inner, TypeDefData::new("", "Innermost", 0x0000_0002));
    module.add_type(TypeDefData::new("N", "Sibling", 0x0010_0001));

    let mut buffers = MetadataBuffers::default();
    let summary = MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    // Top-level types first, then nesting levels breadth-first.
    assert_eq!(summary.row_counts[TableId::TypeDef as usize], 4);
    assert_eq!(summary.row_counts[TableId::NestedClass as usize], 2);
}

#[test]
fn tiny_and_fat_bodies_share_one_stream() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    let ty = module.add_type(TypeDefData::new("N", "C", 0x0010_0001));

    let mut tiny = MethodData::new("Tiny", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
    tiny.body = Some(MethodBodyData {
        il: vec![0x2A],
        max_stack: 1,
        init_locals: false,
        locals: Vec::new(),
        exception_regions: Vec::new(),
    });
    let tiny = module.add_method(ty, tiny);

    let mut fat = MethodData::new("Fat", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
    fat.body = Some(MethodBodyData {
        il: vec![0x2A],
        max_stack: 16,
        init_locals: true,
        locals: vec![dotforge::metadata::model::LocalVariableData {
            var_type: TypeSig::I4,
        }],
        exception_regions: Vec::new(),
    });
    let fat = module.add_method(ty, fat);

    let mut buffers = MetadataBuffers::default();
    let summary = MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    let tiny_body = summary.method_bodies[&tiny];
    let fat_body = summary.method_bodies[&fat];

    // Tiny header byte: length 1 shifted over the format bits.
    assert_eq!(buffers.il[tiny_body.offset as usize], (1 << 2) | 0x02);
    // Fat header starts 4-aligned with the 0x3 format in the low bits.
    assert_eq!(fat_body.offset % 4, 0);
    let flags = u16::from_le_bytes([
        buffers.il[fat_body.offset as usize],
        buffers.il[fat_body.offset as usize + 1],
    ]);
    assert_eq!(flags & 0x3, 0x3);
    assert_eq!(fat_body.local_sig_token.value() >> 24, 0x11);
    assert_eq!(summary.row_counts[TableId::StandAloneSig as usize], 1);
}

#[test]
fn ldstr_lands_in_user_string_stream() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    let ty = module.add_type(TypeDefData::new("N", "C", 0x0010_0001));
    let pseudo = module.add_pseudo_token(dotforge::metadata::model::PseudoTarget::String(
        "hi".to_string(),
    ));

    let mut method = MethodData::new("M", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
    let mut il = vec![0x72];
    il.extend_from_slice(&pseudo.0.to_le_bytes());
    il.push(0x26); // pop
    il.push(0x2A);
    method.body = Some(MethodBodyData {
        il,
        max_stack: 1,
        init_locals: false,
        locals: Vec::new(),
        exception_regions: Vec::new(),
    });
    module.add_method(ty, method);

    let mut buffers = MetadataBuffers::default();
    MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    let user_strings = find_stream(&buffers.metadata, "#US").unwrap();
    let utf16 = [0x68, 0x00, 0x69, 0x00];
    assert!(user_strings
        .windows(4)
        .any(|window| window == utf16));

    // The IL operand was rewritten to a user-string token.
    let operand = u32::from_le_bytes(buffers.il[2..6].try_into().unwrap());
    assert_eq!(operand >> 24, 0x70);
}

#[test]
fn shared_suffixes_fold_in_string_heap() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    module.add_type(TypeDefData::new("N", "Exception", 0x0010_0001));
    module.add_type(TypeDefData::new("N", "MyException", 0x0010_0001));

    let mut buffers = MetadataBuffers::default();
    MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    let strings = find_stream(&buffers.metadata, "#Strings").unwrap();
    let needle = b"Exception\0";
    let occurrences = strings
        .windows(needle.len())
        .filter(|window| window == needle)
        .count();
    // "Exception" exists only as the tail of "MyException".
    assert_eq!(occurrences, 1);
}

#[test]
fn uncompressed_delta_uses_enc_tables_and_dash_stream() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    module.generation = 1;
    module.generation_kind = GenerationKind::UncompressedDelta;
    module.add_type(TypeDefData::new("N", "C", 0x0010_0001));

    let mut buffers = MetadataBuffers::default();
    let summary = MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    assert!(find_stream(&buffers.metadata, "#-").is_some());
    assert!(find_stream(&buffers.metadata, "#~").is_none());
    assert!(summary.row_counts[TableId::EncLog as usize] > 0);
    assert_eq!(
        summary.row_counts[TableId::EncLog as usize],
        summary.row_counts[TableId::EncMap as usize]
    );
}

#[test]
fn minimal_delta_carries_trailing_jtd_stream() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    module.generation = 2;
    module.generation_kind = GenerationKind::MinimalDelta;

    let mut buffers = MetadataBuffers::default();
    MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    let jtd = find_stream(&buffers.metadata, "#JTD").unwrap();
    assert!(jtd.is_empty());
    // Delta padding bit in the heap flags byte of the "#-" stream.
    let tables = find_stream(&buffers.metadata, "#-").unwrap();
    assert_ne!(tables[6] & 0x20, 0);
}

#[test]
fn oversized_identifier_yields_advisory_diagnostic() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    let long = "x".repeat(1100);
    module.add_type(TypeDefData::new("N", &long, 0x0010_0001));

    let mut buffers = MetadataBuffers::default();
    let summary = MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    assert!(summary
        .diagnostics
        .iter()
        .any(|diagnostic| matches!(diagnostic, EmitDiagnostic::NameTooLong { .. })));
    // The name is still emitted.
    let strings = find_stream(&buffers.metadata, "#Strings").unwrap();
    assert!(strings.len() > 1100);
}

#[test]
fn embedded_resources_are_length_prefixed() {
    let mut module = ModuleData::new("demo.dll", Guid::ZERO);
    module.resources.push(ManifestResourceData {
        name: "payload".to_string(),
        is_public: false,
        location: ResourceLocation::Embedded(Box::new(vec![1u8, 2, 3])),
    });

    let mut buffers = MetadataBuffers::default();
    let summary = MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

    assert_eq!(summary.row_counts[TableId::ManifestResource as usize], 1);
    assert_eq!(&buffers.resources[..4], &3u32.to_le_bytes());
    assert_eq!(&buffers.resources[4..7], &[1, 2, 3]);
}
