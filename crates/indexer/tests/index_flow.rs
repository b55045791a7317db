use orca_code_chunker::Granularity;
use orca_indexer::{AdaptivePipeline, IndexerError};
use orca_vector_store::{HashingEmbedder, MemoryVectorStore};
use std::sync::Arc;
use tempfile::TempDir;

fn pipeline(store: Arc<MemoryVectorStore>) -> AdaptivePipeline {
    AdaptivePipeline::new(Arc::new(HashingEmbedder::default()), store, "code_chunks")
        .expect("pipeline")
}

#[tokio::test]
async fn index_directory_stores_relative_paths() {
    let temp = TempDir::new().expect("tempdir");
    let src_dir = temp.path().join("src");
    tokio::fs::create_dir_all(&src_dir)
        .await
        .expect("create src");
    tokio::fs::write(
        src_dir.join("lib.rs"),
        r#"
pub fn hello() {
    println!("hello");
}

pub fn world() {
    println!("world");
}
"#,
    )
    .await
    .expect("write lib.rs");
    tokio::fs::write(
        temp.path().join("tool.py"),
        "def run(args):\n    return main(args)\n",
    )
    .await
    .expect("write tool.py");
    tokio::fs::write(temp.path().join("empty.py"), "\n\n")
        .await
        .expect("write empty.py");
    tokio::fs::write(temp.path().join("notes.md"), "# not code")
        .await
        .expect("write notes.md");

    let store = Arc::new(MemoryVectorStore::new());
    let mut pipeline = pipeline(store.clone());
    let stats = pipeline
        .index_directory(temp.path(), None)
        .await
        .expect("index");

    assert_eq!(stats.files, 2);
    assert!(stats.errors.is_empty(), "errors: {:?}", stats.errors);
    assert_eq!(stats.languages.get("rust"), Some(&1));
    assert_eq!(stats.languages.get("python"), Some(&1));
    assert_eq!(stats.granularities.get(&Granularity::Small), Some(&2));

    let payloads = store.payloads("code_chunks").await;
    assert_eq!(payloads.len(), stats.chunks);
    assert!(payloads.iter().any(|c| c.file_path == "src/lib.rs"));
    assert!(payloads.iter().any(|c| c.file_path == "tool.py"));
}

#[tokio::test]
async fn reindexing_replaces_points() {
    let temp = TempDir::new().expect("tempdir");
    tokio::fs::write(temp.path().join("a.py"), "def a():\n    return 1\n")
        .await
        .expect("write");

    let store = Arc::new(MemoryVectorStore::new());
    let mut pipeline = pipeline(store.clone());
    let first = pipeline.index_directory(temp.path(), None).await.expect("first");
    let second = pipeline.index_directory(temp.path(), None).await.expect("second");

    assert_eq!(first.chunks, second.chunks);
    assert_eq!(store.len("code_chunks").await, first.chunks);
    assert_eq!(pipeline.performance()[&Granularity::Small].successes, 2);
}

#[tokio::test]
async fn process_file_reads_from_disk() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("job.py");
    tokio::fs::write(&path, "def job():\n    return 42\n")
        .await
        .expect("write");

    let store = Arc::new(MemoryVectorStore::new());
    let mut pipeline = pipeline(store.clone());
    let processed = pipeline.process_file(&path, None).await.expect("process");

    assert_eq!(processed.granularity, Granularity::Small);
    assert_eq!(store.len("code_chunks").await, processed.point_ids.len());

    let err = pipeline
        .process_file(&temp.path().join("gone.py"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::IoError(_)));
}

#[tokio::test]
async fn missing_root_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(Arc::new(MemoryVectorStore::new()));
    let err = pipeline
        .index_directory(&temp.path().join("nope"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::InvalidPath(_)));
}
