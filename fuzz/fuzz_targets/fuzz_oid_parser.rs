#![no_main]

use libfuzzer_sys::fuzz_target;

use snmp_fleet::oid::Oid;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(oid) = Oid::parse(s) {
            // Display must round-trip through the parser
            let again = Oid::parse(&oid.to_string()).expect("display output parses");
            assert_eq!(oid, again);
        }
    }
});
