use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// 把 migrations/*.sql 按文件名顺序嵌入二进制，供 `commgate migrate` 使用
fn main() -> io::Result<()> {
    let migrations_dir = Path::new("migrations");
    let out_dir = std::env::var("OUT_DIR").map_err(io::Error::other)?;
    let dest_path = Path::new(&out_dir).join("migrations.rs");

    println!("cargo:rerun-if-changed=migrations/");

    let mut names: Vec<String> = Vec::new();
    if migrations_dir.exists() {
        for entry in fs::read_dir(migrations_dir)? {
            let file_name = entry?.file_name().to_string_lossy().to_string();
            if file_name.ends_with(".sql") {
                names.push(file_name);
            }
        }
    }
    // 001_, 002_ ... 决定执行顺序
    names.sort();

    let entries: Vec<String> = names
        .iter()
        .map(|file_name| {
            format!(
                "    (\"{}\", include_str!(concat!(env!(\"CARGO_MANIFEST_DIR\"), \"/migrations/{}\")))",
                file_name.trim_end_matches(".sql"),
                file_name
            )
        })
        .collect();

    let mut f = fs::File::create(&dest_path)?;
    writeln!(
        f,
        "/// 编译时扫描 migrations/ 目录生成\n\
         pub const MIGRATIONS: &[(&str, &str)] = &[\n{}\n];",
        entries.join(",\n")
    )
}
