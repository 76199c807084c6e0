// ABOUTME: Source tree fixtures and tree comparison for copy and deploy tests.
// ABOUTME: Compares structure, file bytes, and permission bits.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Write a small site: nested dirs, an executable, an empty file and dir.
pub fn write_site(root: &Path) {
    fs::create_dir_all(root.join("assets/css")).unwrap();
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();
    fs::write(root.join("index.html"), "<h1>hello</h1>\n").unwrap();
    fs::write(root.join("assets/app.js"), "console.log('hi');\n").unwrap();
    fs::write(root.join("assets/css/site.css"), "body { margin: 0 }\n").unwrap();
    fs::write(root.join("assets/blank.txt"), "").unwrap();
    fs::write(root.join("bin/run.sh"), "#!/bin/sh\necho run\n").unwrap();
    set_mode(&root.join("bin/run.sh"), 0o755);
    fs::write(root.join("secret.env"), "TOKEN=abc\n").unwrap();
    set_mode(&root.join("secret.env"), 0o600);
}

pub fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

pub fn mode(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o7777
}

#[derive(Debug, PartialEq, Eq)]
pub enum Node {
    Dir { mode: u32 },
    File { mode: u32, content: Vec<u8> },
}

/// Every entry under `root` keyed by relative path, symlinks followed.
pub fn snapshot(root: &Path) -> BTreeMap<String, Node> {
    let mut nodes = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let rel = path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            let meta = fs::metadata(&path).unwrap();
            if meta.is_dir() {
                nodes.insert(rel, Node::Dir { mode: mode(&path) });
                stack.push(path);
            } else {
                nodes.insert(
                    rel,
                    Node::File {
                        mode: mode(&path),
                        content: fs::read(&path).unwrap(),
                    },
                );
            }
        }
    }
    nodes
}

/// Assert two trees hold the same entries, bytes, and permission bits.
pub fn assert_same_tree(expected: &Path, actual: &Path) {
    assert_eq!(snapshot(expected), snapshot(actual));
    assert_eq!(mode(expected), mode(actual), "root permission bits differ");
}
