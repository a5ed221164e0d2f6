#![no_main]

use dbus_metatype::{Endian, MetaType, Reader, Registry, Result, Signature, Writer};
use libfuzzer_sys::{fuzz_target, Corpus};
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Default)]
struct Nested {
    name: String,
    values: Vec<u32>,
    properties: HashMap<String, zvariant::OwnedValue>,
}

fn write_nested(writer: &mut Writer<'_>, nested: &Nested) -> Result<()> {
    writer.begin_structure();
    writer.append(&nested.name)?;
    writer.append(&nested.values)?;
    writer.append(&nested.properties)?;
    writer.end_structure()
}

fn read_nested(reader: &mut Reader<'_>) -> Result<Nested> {
    reader.begin_structure()?;
    let nested = Nested {
        name: reader.read()?,
        values: reader.read()?,
        properties: reader.read()?,
    };
    reader.end_structure()?;
    Ok(nested)
}

static REGISTRY: LazyLock<(Registry, Vec<MetaType>)> = LazyLock::new(|| {
    let registry = Registry::new();
    let mut types = registry.registered_types();
    if let Ok(array) = registry.register_array::<u32>() {
        types.push(array);
    }
    if let Ok(nested) = registry.register(write_nested, read_nested) {
        types.push(nested);
    }
    if let Ok(list) = registry.register_array::<Nested>() {
        types.push(list);
    }
    (registry, types)
});

fuzz_target!(|data: &[u8]| -> Corpus {
    let (registry, types) = &*REGISTRY;
    let Some((selector, body)) = data.split_first() else {
        return Corpus::Reject;
    };

    let meta_type = types[*selector as usize % types.len()];
    let endian = if selector & 0x80 == 0 {
        Endian::Little
    } else {
        Endian::Big
    };

    let mut reader = Reader::new(registry, body, endian);
    match registry.demarshall(&mut reader, meta_type) {
        Ok(_) => {
            let _: Option<Signature> = registry.type_to_signature(meta_type).ok();
            Corpus::Keep
        }
        Err(_) => Corpus::Reject,
    }
});
