//! Reads an `apply -f`/`delete -f` manifest (a file path or `-` for
//! stdin) as one or more `---`-separated YAML/JSON documents.

use std::io::Read;

use anyhow::Context;
use serde::Deserialize as _;

use kuke_core::Doc;

pub fn read_source(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("read manifest from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("read manifest file {path:?}"))
}

pub fn parse_documents(content: &str) -> anyhow::Result<Vec<Doc>> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let doc: Doc = Doc::deserialize(document).context("parse manifest document")?;
        docs.push(doc);
    }
    Ok(docs)
}
