#![no_main]
use libfuzzer_sys::fuzz_target;
use molstack_struct::pdbx::PdbxFile;

fuzz_target!(|data: &str| {
    let Ok(file) = PdbxFile::parse(data) else {
        return;
    };
    let blocks: Vec<String> = file.block_names().iter().map(|b| b.to_string()).collect();
    for block in &blocks {
        let Ok(names) = file.category_names(Some(block)) else {
            continue;
        };
        for name in names {
            let _ = file.get_category(name, Some(block));
        }
    }
    let _ = molstack_struct::get_structure(&file, None);
});
