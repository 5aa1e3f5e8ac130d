use std::sync::Arc;

use anyhow::Context;

use rolegate::core::logging;
use rolegate::llm::{ChatMessage, ChatProvider, EmbeddingProvider, OpenAiCompatProvider};
use rolegate::safety::HttpSafetyClassifier;
use rolegate::{
    AppConfig, GenerationOptions, IngestPipeline, MongoVectorStore, RagError, RagOutcome,
    RagService, RbacRetriever, RetrievalStore, RoleRegistry, TaggedText,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = AppConfig::from_env().context("loading configuration")?;
    let registry = RoleRegistry::new(&config.allowed_roles);

    let store = MongoVectorStore::connect(&config.mongo_uri).await?;
    for (database, role) in store.database_roles().await? {
        tracing::info!("store role '{}' in database '{}'", role, database);
    }
    let bound: Arc<dyn RetrievalStore> = Arc::new(store.bind_target(&config.target).await?);

    let provider = Arc::new(OpenAiCompatProvider::new(
        config.api_base_url.clone(),
        config.api_key.clone(),
    ));
    let embedder: Arc<dyn EmbeddingProvider> = provider.clone();
    let chat: Arc<dyn ChatProvider> = provider;

    let pipeline = IngestPipeline::new(
        bound.clone(),
        embedder.clone(),
        config.embedding_model.clone(),
    );
    let batch = vec![
        TaggedText::new(
            "I will be laying off everybody at the company in the next 5 months.",
            &["ceo"],
            &registry,
        )?,
        TaggedText::new(
            "I plan on leaving the company for a competitor after the Series B.",
            &["manager"],
            &registry,
        )?,
        TaggedText::new(
            "The only reason I'm in this role is because my father is the head of HR.",
            &["intern"],
            &registry,
        )?,
    ];
    match pipeline.ingest(batch, true).await {
        Ok(count) => tracing::info!("ingested {} documents", count),
        Err(RagError::EmptyBatch) => tracing::info!("nothing new to ingest"),
        Err(err) => return Err(err.into()),
    }

    let mut service = RagService::new(
        chat,
        embedder,
        RbacRetriever::new(bound),
        config.chat_model.clone(),
        config.embedding_model.clone(),
    );
    if let Some(key) = config.safety_key.clone() {
        service = service.with_safety(Arc::new(HttpSafetyClassifier::new(
            config.safety_url.clone(),
            key,
        )));
    }

    let privileges = vec![registry.validate("ceo")?];
    let messages = vec![ChatMessage::user(
        "What will happen to the company in the next half year?",
    )];

    match service
        .retrieve_and_generate(messages, &privileges, &GenerationOptions::default())
        .await?
    {
        RagOutcome::Answer(text) => println!("{}", text),
        RagOutcome::NoContext => println!("no authorized context matched the query"),
        RagOutcome::Blocked { reason } => println!("generation blocked: {}", reason),
    }

    Ok(())
}
