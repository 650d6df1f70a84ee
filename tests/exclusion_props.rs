use std::collections::BTreeSet;
use std::path::Path;

use proptest::prelude::*;

use sitepipe::fileset::{FileSet, resolve};
use sitepipe::fs::mock::MockFileSystem;
use sitepipe::watch::TaskWatchProfile;

const EXTENSIONS: &[&str] = &["css", "js", "png", "scss"];

fn site_files() -> impl Strategy<Value = BTreeSet<(String, String, &'static str)>> {
    prop::collection::btree_set(
        ("[a-c]{1,2}", "[a-d_]{1,3}", prop::sample::select(EXTENSIONS)),
        1..16,
    )
}

fn rel_path((dir, stem, ext): &(String, String, &'static str)) -> String {
    format!("src/{dir}/{stem}.{ext}")
}

proptest! {
    #[test]
    fn excluded_files_never_resolve(
        files in site_files(),
        excluded in prop::sample::select(EXTENSIONS),
        negated in any::<bool>(),
    ) {
        let fs = MockFileSystem::new();
        for file in &files {
            fs.add_file(Path::new("/site").join(rel_path(file)), "x");
        }

        let exclude = format!("src/**/*.{excluded}");
        let set = if negated {
            FileSet::new(["src/**/*".to_string(), format!("!{exclude}")], Vec::<String>::new(), "/site/dist")
        } else {
            FileSet::new(["src/**/*".to_string()], [exclude], "/site/dist")
        };
        let resolved = resolve(&fs, Path::new("/site"), &set).unwrap();

        for src in &resolved {
            prop_assert_ne!(src.path.extension().and_then(|e| e.to_str()), Some(excluded));
        }
        let expected = files.iter().filter(|(_, _, ext)| *ext != excluded).count();
        prop_assert_eq!(resolved.len(), expected);
    }

    #[test]
    fn excluded_paths_never_trigger_a_watch(
        files in site_files(),
        excluded in prop::sample::select(EXTENSIONS),
    ) {
        let profile = TaskWatchProfile::new(
            "styles",
            &["src/**/*".to_string(), format!("!src/**/*.{excluded}")],
        )
        .unwrap();

        for file in &files {
            prop_assert_eq!(profile.matches(&rel_path(file)), file.2 != excluded);
        }
    }
}
