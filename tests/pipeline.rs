//! End-to-end pipeline tests: index a small corpus, run query turns through
//! the orchestrator with scripted planner decisions, and check what reaches
//! the generation prompt and the conversation history.

mod support;

use concretebuddy::agent::{AgentOrchestrator, ConversationStore};
use concretebuddy::config::RetrievalConfig;
use concretebuddy::index::{Chunk, DocType, IndexBuilder};
use concretebuddy::providers::{Embedder, PlannerReply, Reranker};
use concretebuddy::rag::{ContextAssembler, CONTEXT_SEPARATOR};
use concretebuddy::retrieval::{EnsembleRetriever, FilteredRetriever};
use concretebuddy::store::{DenseIndex, LexicalIndex, ParentStore};
use concretebuddy::types::{ChatMessage, ChatRole, StreamEvent, ToolInvocation};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use support::{HashEmbedder, InMemoryDenseIndex, OverlapReranker, ScriptedChat};
use tempfile::TempDir;
use tokio::sync::mpsc;

const ASTM_C109: &str = "\
# Significance and Use

This test method covers compressive strength of hydraulic cement mortars \
using two inch cube specimens.

# Procedure

Mold the specimens immediately after mixing.

## Tamping

Tamp the mortar in each cube compartment thirty two times in about ten \
seconds in four rounds.
";

const HK_CODE: &str = "\
# Durability Requirements

Minimum cement content depends on the exposure class of the element.

# Cover

Nominal cover to reinforcement shall account for the fire rating.
";

struct Pipeline {
    orchestrator: AgentOrchestrator,
    conversations: Arc<ConversationStore>,
    chat: Arc<ScriptedChat>,
    parents: ParentStore,
    _dir: TempDir,
}

impl Pipeline {
    /// Index the two-document corpus and wire a full serving pipeline with
    /// the scripted chat model.
    async fn indexed(chat: ScriptedChat) -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("astm_c109.md"), ASTM_C109).unwrap();
        fs::write(data.join("hk_code.md"), HK_CODE).unwrap();

        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder);
        let dense: Arc<dyn DenseIndex> = Arc::new(InMemoryDenseIndex::new());
        let parents = ParentStore::new(dir.path().join("parents"));
        let snapshot = dir.path().join("lexical.json");

        let builder = IndexBuilder::new(
            embedder.clone(),
            dense.clone(),
            parents.clone(),
            &snapshot,
        );
        builder.build(&data).await.unwrap();

        let lexical = Arc::new(LexicalIndex::load(&snapshot).unwrap());
        Self::wire(dir, chat, lexical, dense, embedder, parents)
    }

    /// Wire a pipeline over prebuilt chunks, skipping the index builder
    async fn with_chunks(chat: ScriptedChat, chunks: Vec<Chunk>) -> Self {
        let dir = TempDir::new().unwrap();

        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder);
        let dense: Arc<dyn DenseIndex> = Arc::new(InMemoryDenseIndex::new());
        let parents = ParentStore::new(dir.path().join("parents"));
        parents.put_batch(&[]).unwrap();

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        dense.rebuild(&chunks, &embeddings).await.unwrap();

        let lexical = Arc::new(LexicalIndex::build(chunks));
        Self::wire(dir, chat, lexical, dense, embedder, parents)
    }

    fn wire(
        dir: TempDir,
        chat: ScriptedChat,
        lexical: Arc<LexicalIndex>,
        dense: Arc<dyn DenseIndex>,
        embedder: Arc<dyn Embedder>,
        parents: ParentStore,
    ) -> Self {
        let config = RetrievalConfig::default();
        let chat = Arc::new(chat);
        let conversations = Arc::new(ConversationStore::new());
        let reranker: Arc<dyn Reranker> = Arc::new(OverlapReranker);

        let orchestrator = AgentOrchestrator::new(
            chat.clone(),
            Arc::new(EnsembleRetriever::new(
                lexical,
                dense.clone(),
                embedder.clone(),
                config.clone(),
            )),
            Arc::new(FilteredRetriever::new(dense, embedder, &config)),
            Arc::new(ContextAssembler::new(
                reranker,
                parents.clone(),
                config.rerank_top_n,
            )),
            conversations.clone(),
        );

        Self {
            orchestrator,
            conversations,
            chat,
            parents,
            _dir: dir,
        }
    }

    async fn run(&self, query: &str, conversation_id: &str) -> Vec<StreamEvent> {
        let rx = self
            .orchestrator
            .submit_query(query.to_string(), Some(conversation_id.to_string()));
        collect(rx).await
    }

    async fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        let handle = self.conversations.handle(conversation_id);
        let history = handle.lock().await;
        history.clone()
    }
}

async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn content_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Content { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn identifier_call(query: &str, method_id: &str) -> ToolInvocation {
    ToolInvocation {
        name: "identifier_search".to_string(),
        arguments: json!({
            "query": query,
            "doc_type": "ASTM Test",
            "method_id": method_id,
        }),
    }
}

fn general_call(query: &str) -> ToolInvocation {
    ToolInvocation {
        name: "general_search".to_string(),
        arguments: json!({ "query": query }),
    }
}

#[tokio::test]
async fn identifier_query_returns_full_parent_section() {
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![PlannerReply {
            content: String::new(),
            tool_calls: vec![identifier_call("cube tamping procedure", "C109")],
        }],
        vec![vec!["Tamp thirty two times.".to_string()]],
    ))
    .await;

    let events = pipeline.run("How do I tamp cubes per ASTM C109?", "t1").await;

    assert_eq!(content_text(&events), "Tamp thirty two times.");
    assert!(matches!(events.last().unwrap(), StreamEvent::Done { .. }));

    // The tool result carries the parent section, not the child fragment:
    // the Procedure parent includes its Tamping subsection verbatim.
    let history = pipeline.history("t1").await;
    assert_eq!(history.len(), 4);
    let tool_result = &history[2];
    assert_eq!(tool_result.role, ChatRole::Tool);
    assert!(tool_result.content.contains("Mold the specimens"));
    assert!(tool_result.content.contains("## Tamping"));
    assert!(tool_result.content.contains("thirty two times"));

    // The same context reaches the generation system prompt
    let generate_contexts = pipeline.chat.generate_contexts.lock().unwrap();
    let system = &generate_contexts[0][0];
    assert_eq!(system.role, ChatRole::System);
    assert!(system.content.contains("question-answering tasks"));
    assert!(system.content.contains("## Tamping"));
}

#[tokio::test]
async fn identifier_filter_excludes_other_documents() {
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![PlannerReply {
            content: String::new(),
            tool_calls: vec![identifier_call("cover requirements", "C109")],
        }],
        vec![vec!["Answer.".to_string()]],
    ))
    .await;

    pipeline.run("What does C109 say about cover?", "t1").await;

    // Reference-code content never passes the ASTM Test / c109 filter,
    // even though the query overlaps the HK code text.
    let history = pipeline.history("t1").await;
    assert!(!history[2].content.contains("Nominal cover"));
    assert!(history[2].content.contains("cube"));
}

#[tokio::test]
async fn general_query_routes_through_ensemble() {
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![PlannerReply {
            content: String::new(),
            tool_calls: vec![general_call("minimum cement content exposure class")],
        }],
        vec![vec!["Depends on exposure class.".to_string()]],
    ))
    .await;

    let events = pipeline
        .run("What decides the minimum cement content?", "t1")
        .await;

    assert_eq!(content_text(&events), "Depends on exposure class.");

    let history = pipeline.history("t1").await;
    assert!(history[2].content.contains("exposure class"));
}

#[tokio::test]
async fn missing_parent_falls_back_to_child_text() {
    let orphan = Chunk {
        id: "c1".to_string(),
        text: "Report the flow to the nearest one percent.".to_string(),
        header_path: vec!["Report".to_string()],
        doc_type: DocType::TestMethod,
        method_id: "c1437".to_string(),
        parent_id: Some("ghost-parent".to_string()),
        source: "astm_c1437.md".to_string(),
    };

    let pipeline = Pipeline::with_chunks(
        ScriptedChat::new(
            vec![PlannerReply {
                content: String::new(),
                tool_calls: vec![general_call("flow reporting precision")],
            }],
            vec![vec!["Nearest one percent.".to_string()]],
        ),
        vec![orphan],
    )
    .await;

    let events = pipeline.run("How precisely is flow reported?", "t1").await;

    // The turn still answers; the unresolvable parent is replaced by the
    // child's own text.
    assert_eq!(content_text(&events), "Nearest one percent.");
    let history = pipeline.history("t1").await;
    assert_eq!(
        history[2].content,
        "Report the flow to the nearest one percent."
    );
}

#[tokio::test]
async fn second_turn_sees_answers_but_not_tool_results() {
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![
            PlannerReply {
                content: String::new(),
                tool_calls: vec![identifier_call("tamping", "C109")],
            },
            PlannerReply {
                content: "Four rounds.".to_string(),
                tool_calls: Vec::new(),
            },
        ],
        vec![vec!["Thirty two tamps per layer.".to_string()]],
    ))
    .await;

    pipeline.run("How many tamps for C109 cubes?", "t1").await;
    pipeline.run("And how many rounds?", "t1").await;

    let plan_contexts = pipeline.chat.plan_contexts.lock().unwrap();
    let second = &plan_contexts[1];

    let roles: Vec<ChatRole> = second.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![ChatRole::Human, ChatRole::Assistant, ChatRole::Human]);
    assert_eq!(second[0].content, "How many tamps for C109 cubes?");
    assert_eq!(second[1].content, "Thirty two tamps per layer.");
    assert_eq!(second[2].content, "And how many rounds?");
    assert!(second.iter().all(|m| m.tool_calls.is_empty()));
}

#[tokio::test]
async fn multiple_tool_calls_assemble_in_request_order() {
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![PlannerReply {
            content: String::new(),
            tool_calls: vec![
                identifier_call("tamping", "C109"),
                general_call("nominal cover fire rating"),
            ],
        }],
        vec![vec!["Combined answer.".to_string()]],
    ))
    .await;

    pipeline.run("Compare C109 tamping with cover rules", "t1").await;

    let history = pipeline.history("t1").await;
    // human, assistant tool request, two tool results, answer
    assert_eq!(history.len(), 5);
    assert!(history[2].content.contains("Tamp"));
    assert!(history[3].content.contains("Nominal cover"));

    // Both contexts reach generation, joined in tool order
    let generate_contexts = pipeline.chat.generate_contexts.lock().unwrap();
    let system = &generate_contexts[0][0].content;
    let tamping_at = system.find("Tamp").unwrap();
    let cover_at = system.find("Nominal cover").unwrap();
    assert!(tamping_at < cover_at);
}

#[tokio::test]
async fn duplicate_children_of_one_parent_repeat_the_parent() {
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![PlannerReply {
            content: String::new(),
            tool_calls: vec![identifier_call("molding and tamping cubes", "C109")],
        }],
        vec![vec!["ok".to_string()]],
    ))
    .await;

    pipeline.run("Procedure for molding C109 cubes?", "t1").await;

    // The Procedure parent has two children (its preface and the Tamping
    // subsection); both are retrieved under the c109 filter, so the parent
    // appears once per child with no deduplication.
    let history = pipeline.history("t1").await;
    assert!(history[2].content.contains(CONTEXT_SEPARATOR));
    let occurrences = history[2].content.matches("Mold the specimens").count();
    assert_eq!(occurrences, 2);

    // Parents persisted for the test-method document only
    let stored = pipeline.parents.dir().read_dir().unwrap().count();
    assert_eq!(stored, 2);
}

#[tokio::test]
async fn dropped_receiver_cancels_turn_without_commit() {
    // More fragments than the event channel buffers, so the producer cannot
    // finish the stream before the consumer walks away.
    let fragments: Vec<String> = (0..64).map(|i| format!("fragment {} ", i)).collect();
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![PlannerReply {
            content: String::new(),
            tool_calls: vec![general_call("tamping rounds")],
        }],
        vec![fragments],
    ))
    .await;

    let mut rx = pipeline
        .orchestrator
        .submit_query("How many tamping rounds?".to_string(), Some("t1".to_string()));

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, StreamEvent::Content { .. }));
    drop(rx);

    // history() waits on the conversation lock, which the turn holds until
    // it resolves; a cancelled turn commits nothing.
    let history = pipeline.history("t1").await;
    assert!(history.is_empty());
}

#[tokio::test]
async fn turns_on_one_conversation_run_sequentially() {
    let pipeline = Pipeline::indexed(ScriptedChat::new(
        vec![
            PlannerReply {
                content: "First answer.".to_string(),
                tool_calls: Vec::new(),
            },
            PlannerReply {
                content: "Second answer.".to_string(),
                tool_calls: Vec::new(),
            },
        ],
        Vec::new(),
    ))
    .await;

    // Both turns target the same conversation at once; either may win the
    // lock, but they must commit whole turns in sequence.
    tokio::join!(
        pipeline.run("first question", "t1"),
        pipeline.run("second question", "t1"),
    );

    let history = pipeline.history("t1").await;
    let roles: Vec<ChatRole> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![ChatRole::Human, ChatRole::Assistant, ChatRole::Human, ChatRole::Assistant]
    );

    // The turn that planned second saw the first turn's committed exchange
    let plan_contexts = pipeline.chat.plan_contexts.lock().unwrap();
    let mut lens: Vec<usize> = plan_contexts.iter().map(|c| c.len()).collect();
    lens.sort();
    assert_eq!(lens, vec![1, 3]);

    let later = plan_contexts.iter().find(|c| c.len() == 3).unwrap();
    assert_eq!(later[0].content, history[0].content);
    assert_eq!(later[1].content, history[1].content);
}
