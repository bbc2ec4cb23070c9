#![no_main]

use libfuzzer_sys::fuzz_target;

use snmp_fleet::schema::{SchemaSet, parse_module, strip_leading_comments};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = strip_leading_comments(text);

    // Parsed modules must always be resolvable, whatever the parser accepted
    if let Ok(module) = parse_module(text) {
        let set = SchemaSet::build(std::slice::from_ref(&module));
        for def in &module.definitions {
            let _ = set.lookup(&def.name);
        }
    }
});
