#![no_main]

use dbus_metatype::{Registry, SignatureTy};
use libfuzzer_sys::{fuzz_target, Corpus};
use std::sync::LazyLock;

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fuzz_target!(|data: &str| -> Corpus {
    let Ok(signature) = SignatureTy::new(data) else {
        return Corpus::Reject;
    };

    for ty in signature.complete_types() {
        assert!(ty.is_single_complete_type());
        ty.alignment();
        if ty.is_array() {
            ty.element();
        }
        if ty.is_dict() {
            let (key, _) = ty.key_value();
            assert!(key.is_basic());
        }
        if ty.is_struct() {
            assert!(ty.members().count() > 0);
        }

        let _ = REGISTRY.signature_to_meta_type(ty.as_str());
    }

    Corpus::Keep
});
