//! End-to-end batch runs with deterministic providers.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::*;
use docqa_rag::{
    InMemoryVectorStore, NOT_AVAILABLE, NoOpNotifier, RagConfig, RagError, TermOverlapReranker,
    VectorStore, format_notification,
};

#[tokio::test]
async fn company_report_answers_known_facts_and_declines_unknown_ones() {
    let file = write_document(COMPANY_REPORT);
    let docqa = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        Arc::new(NoOpNotifier),
    );

    let report = docqa
        .run(
            file.path(),
            &queries(&[
                "When was Company X founded?",
                "What was the 2023 revenue?",
                "What is the CEO's name?",
            ]),
            false,
        )
        .await
        .unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.results[0].query, "When was Company X founded?");
    assert!(report.results[0].answer.contains("2010"));
    assert!(report.results[1].answer.contains("$5M"));
    assert_eq!(report.results[2].answer, NOT_AVAILABLE);
}

#[tokio::test]
async fn failing_query_is_isolated_and_order_is_kept() {
    let file = write_document(COMPANY_REPORT);
    let docqa = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(SelectiveReranker { poison: "revenue" }),
        Arc::new(NoOpNotifier),
    );

    let report = docqa
        .run(
            file.path(),
            &queries(&[
                "When was Company X founded?",
                "What was the revenue of Company X in 2023?",
                "Who is the CEO of Company Y?",
            ]),
            false,
        )
        .await
        .unwrap();

    let answered: Vec<&str> = report.results.iter().map(|r| r.query.as_str()).collect();
    assert_eq!(
        answered,
        vec!["When was Company X founded?", "Who is the CEO of Company Y?"]
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.failures[0].phase, "reranking");
}

#[tokio::test]
async fn notifications_are_sent_in_query_order() {
    let file = write_document(COMPANY_REPORT);
    let notifier = Arc::new(RecordingNotifier::default());
    let docqa = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        notifier.clone(),
    );

    let report = docqa
        .run(
            file.path(),
            &queries(&["When was Company X founded?", "Who is the CEO of Company Y?"]),
            true,
        )
        .await
        .unwrap();

    let messages = notifier.messages.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[1],
        format_notification("Who is the CEO of Company Y?", NOT_AVAILABLE)
    );
    assert!(messages[0].starts_with("*User Query:* When was Company X founded?\n*AI Response:* "));
    assert!(report.notification_failures.is_empty());
}

#[tokio::test]
async fn notification_failures_do_not_change_results() {
    let file = write_document(COMPANY_REPORT);
    let questions = queries(&["When was Company X founded?", "Who is the CEO of Company Y?"]);

    let quiet = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        Arc::new(NoOpNotifier),
    )
    .run(file.path(), &questions, false)
    .await
    .unwrap();

    let noisy = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        Arc::new(UnreachableNotifier),
    )
    .run(file.path(), &questions, true)
    .await
    .unwrap();

    assert_eq!(quiet.results, noisy.results);
    assert_eq!(noisy.notification_failures.len(), 2);
    assert!(noisy.failures.is_empty());
}

#[tokio::test]
async fn notifications_are_not_sent_unless_requested() {
    let file = write_document(COMPANY_REPORT);
    let notifier = Arc::new(RecordingNotifier::default());
    let docqa = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        notifier.clone(),
    );

    docqa.run(file.path(), &queries(&["When was Company X founded?"]), false).await.unwrap();
    assert!(notifier.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsummarizable_table_is_skipped() {
    let file = write_document(
        "Company X was founded in 2010.\n\n| Metric | Value |\n|---|---|\n| broken | 1 |\n",
    );
    let docqa = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        Arc::new(NoOpNotifier),
    );

    let report =
        docqa.run(file.path(), &queries(&["When was Company X founded?"]), false).await.unwrap();
    assert_eq!(report.skipped_blocks.len(), 1);
    assert!(report.results[0].answer.contains("2010"));
}

#[tokio::test]
async fn blank_document_answers_sentinel() {
    let file = write_document("\n\n   \n");
    let docqa = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        Arc::new(NoOpNotifier),
    );

    let report =
        docqa.run(file.path(), &queries(&["When was Company X founded?"]), false).await.unwrap();
    assert_eq!(report.results[0].answer, NOT_AVAILABLE);
}

#[tokio::test]
async fn index_is_discarded_after_the_batch() {
    let store = Arc::new(InMemoryVectorStore::new());
    let file = write_document(COMPANY_REPORT);
    let docqa = docqa(store.clone(), Arc::new(TermOverlapReranker), Arc::new(NoOpNotifier));

    let report =
        docqa.run(file.path(), &queries(&["When was Company X founded?"]), false).await.unwrap();
    assert!(report.index.starts_with("docqa_"));
    assert!(store.list_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_runs_do_not_share_an_index() {
    let store = Arc::new(InMemoryVectorStore::new());
    let docqa = docqa(store, Arc::new(TermOverlapReranker), Arc::new(NoOpNotifier));
    let first = write_document("Company X was founded in 2010.\n");
    let second = write_document("Company X was founded in 1999.\n");
    let question = queries(&["When was Company X founded?"]);

    let (a, b) = tokio::join!(
        docqa.run(first.path(), &question, false),
        docqa.run(second.path(), &question, false)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.index, b.index);
    assert!(a.results[0].answer.contains("2010") && !a.results[0].answer.contains("1999"));
    assert!(b.results[0].answer.contains("1999") && !b.results[0].answer.contains("2010"));
}

#[tokio::test]
async fn empty_query_list_is_rejected() {
    let file = write_document(COMPANY_REPORT);
    let docqa = docqa(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(TermOverlapReranker),
        Arc::new(NoOpNotifier),
    );
    let err = docqa.run(file.path(), &[], false).await.unwrap_err();
    assert!(matches!(err, RagError::Config(_)));
}

#[tokio::test]
async fn unreadable_document_aborts_the_batch() {
    let store = Arc::new(InMemoryVectorStore::new());
    let docqa = docqa(store.clone(), Arc::new(TermOverlapReranker), Arc::new(NoOpNotifier));
    let err = docqa
        .run(Path::new("/nonexistent/report.pdf"), &queries(&["anything?"]), false)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::DocumentParse { .. }));
    assert!(store.list_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn embedding_failure_aborts_the_batch_and_discards_the_index() {
    let store = Arc::new(InMemoryVectorStore::new());
    let docqa = offline_builder()
        .embedding_provider(Arc::new(FailingEmbedder))
        .vector_store(store.clone())
        .build()
        .unwrap();
    let file = write_document(COMPANY_REPORT);

    let err = docqa
        .run(file.path(), &queries(&["When was Company X founded?"]), false)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Embedding { .. }));
    assert!(store.list_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_insert_failure_aborts_the_batch_and_discards_the_index() {
    let inner = Arc::new(InMemoryVectorStore::new());
    let docqa = offline_builder()
        .embedding_provider(Arc::new(HashingEmbedder))
        .vector_store(Arc::new(ReadOnlyStore { inner: inner.clone() }))
        .build()
        .unwrap();
    let file = write_document(COMPANY_REPORT);

    let err = docqa
        .run(file.path(), &queries(&["When was Company X founded?"]), false)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::IndexBuild { .. }));
    assert!(inner.list_tables().await.unwrap().is_empty());
}

#[test]
fn builder_rejects_overlap_that_swallows_chunks() {
    let config = RagConfig { chunk_size: 40, chunk_overlap: 40, ..RagConfig::default() };
    let err = offline_builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbedder))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RagError::Config(ref m) if m.contains("chunk_overlap")));
}
