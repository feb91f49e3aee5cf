use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::document::Document;
use super::ingest::{file_name, ingest_file, IngestError};
use super::prompt::build_prompt;
use super::ranking::{build_context, build_excerpts, find_relevant_documents, Excerpt};
use super::store::{Store, StoreError};
use crate::config::Settings;
use crate::utils::gemini::{AnswerGenerator, GeminiClient, GeminiError};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Please enter a question")]
    EmptyQuery,

    #[error("Please enter your Google API key")]
    MissingApiKey,

    #[error("Please upload at least one document")]
    NoDocuments,

    #[error(transparent)]
    Generation(#[from] GeminiError),
}

#[derive(Error, Debug)]
pub enum AddError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AddError {
    pub fn code(&self) -> &'static str {
        match self {
            AddError::Ingest(e) => e.code(),
            AddError::Store(_) => "ERR_STORE",
        }
    }
}

/// Outcome of adding one file in a batch.
#[derive(Debug)]
pub struct AddOutcome {
    pub path: PathBuf,
    pub result: Result<Document, AddError>,
}

/// An answer from the model together with what it was based on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub query: String,
    pub text: String,
    pub model: String,
    pub documents: Vec<String>,
    pub answered_at: DateTime<Utc>,
}

/// The document collection plus the model used to answer questions about it.
pub struct KnowledgeBase {
    store: Store,
    model: String,
    generator: Option<Box<dyn AnswerGenerator>>,
}

impl KnowledgeBase {
    /// Builds a knowledge base that answers through Gemini when an API key is configured.
    pub fn new(store: Store, settings: &Settings) -> Result<Self, GeminiError> {
        let generator = match &settings.api_key {
            Some(key) => {
                let client = GeminiClient::with_endpoint(key.clone(), settings.endpoint.clone())?;
                Some(Box::new(client) as Box<dyn AnswerGenerator>)
            }
            None => None,
        };
        Ok(Self {
            store,
            model: settings.model.clone(),
            generator,
        })
    }

    #[cfg(test)]
    pub fn with_generator(
        store: Store,
        model: impl Into<String>,
        generator: Option<Box<dyn AnswerGenerator>>,
    ) -> Self {
        Self {
            store,
            model: model.into(),
            generator,
        }
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn can_answer(&self) -> bool {
        self.generator.is_some()
    }

    pub fn documents(&self) -> &[Document] {
        self.store.documents()
    }

    /// Adds one file. Names already present are refused before the file is read.
    pub fn add_file(&mut self, path: &Path) -> Result<Document, AddError> {
        let name = file_name(path);
        if self.store.contains_name(&name) {
            return Err(IngestError::Duplicate(name).into());
        }
        let document = ingest_file(path)?;
        self.store.add(document.clone())?;
        Ok(document)
    }

    /// Adds files one after another; a failing file does not stop the rest.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<AddOutcome> {
        paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let result = self.add_file(path);
                AddOutcome {
                    path: path.to_path_buf(),
                    result,
                }
            })
            .collect()
    }

    pub fn remove(&mut self, id: &str) -> Result<Document, StoreError> {
        self.store.remove(id)
    }

    /// Ranks the documents for `query` and returns their best excerpts, without asking the model.
    pub fn find(&self, query: &str) -> Result<Vec<Excerpt>, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if self.store.documents().is_empty() {
            return Err(QueryError::NoDocuments);
        }
        let ranked = find_relevant_documents(query, self.store.documents());
        debug!(target: "session", query = query, hits = ranked.len(), "Documents ranked");
        Ok(build_excerpts(query, &ranked))
    }

    /// Answers `query` from the stored documents using the configured model.
    pub async fn ask(&self, query: &str) -> Result<Answer, QueryError> {
        self.ask_with_model(query, &self.model).await
    }

    pub async fn ask_with_model(&self, query: &str, model: &str) -> Result<Answer, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let generator = self.generator.as_ref().ok_or(QueryError::MissingApiKey)?;
        if self.store.documents().is_empty() {
            return Err(QueryError::NoDocuments);
        }

        let excerpts = self.find(query)?;
        let context = build_context(&excerpts);
        let prompt = build_prompt(query, &context);
        info!(target: "session", model = model, documents = excerpts.len(), "Asking model");

        let text = generator.generate(model, &prompt).await?;
        Ok(Answer {
            query: query.to_string(),
            text,
            model: model.to_string(),
            documents: excerpts.into_iter().map(|e| e.name).collect(),
            answered_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingGenerator {
        prompts: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl AnswerGenerator for RecordingGenerator {
        async fn generate(&self, model: &str, prompt: &str) -> Result<String, GeminiError> {
            self.prompts
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));
            Ok("## Main Answer\nIt is red [Document: apple.txt]".to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GeminiError> {
            Err(GeminiError::Api("quota exceeded".to_string()))
        }
    }

    fn kb_with(
        dir: &Path,
        generator: Option<Box<dyn AnswerGenerator>>,
    ) -> KnowledgeBase {
        KnowledgeBase::with_generator(Store::open(dir).unwrap(), "gemini-2.5-flash", generator)
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn batch_add_continues_past_failures() {
        let files = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let mut kb = kb_with(data.path(), None);

        let good = write(files.path(), "apple.txt", "The apple is red.");
        let bad = write(files.path(), "photo.jpg", "not really a photo");
        let other = write(files.path(), "pear.txt", "The pear is green.");

        let outcomes = kb.add_files(&[good.clone(), bad, other, good]);
        let oks: Vec<bool> = outcomes.iter().map(|o| o.result.is_ok()).collect();
        assert_eq!(oks, vec![true, false, true, false]);
        assert_eq!(
            outcomes[3].result.as_ref().unwrap_err().to_string(),
            "File \"apple.txt\" already exists"
        );
        assert_eq!(kb.documents().len(), 2);
    }

    #[tokio::test]
    async fn ask_validates_in_order() {
        let data = tempfile::tempdir().unwrap();
        let kb = kb_with(data.path(), None);
        assert!(matches!(kb.ask("   ").await, Err(QueryError::EmptyQuery)));
        assert!(matches!(kb.ask("q").await, Err(QueryError::MissingApiKey)));

        let kb = kb_with(data.path(), Some(Box::new(RecordingGenerator::default())));
        let err = kb.ask("q").await.unwrap_err();
        assert_eq!(err.to_string(), "Please upload at least one document");
    }

    #[tokio::test]
    async fn ask_sends_ranked_context_to_model() {
        let files = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let generator = RecordingGenerator::default();
        let prompts = generator.prompts.clone();
        let mut kb = kb_with(data.path(), Some(Box::new(generator)));

        kb.add_file(&write(files.path(), "apple.txt", "The apple is red and crunchy."))
            .unwrap();
        kb.add_file(&write(files.path(), "pear.txt", "The pear is green."))
            .unwrap();

        let answer = kb.ask("  What colour is the apple?  ").await.unwrap();
        assert_eq!(answer.query, "What colour is the apple?");
        assert_eq!(answer.model, "gemini-2.5-flash");
        assert!(answer.documents.contains(&"apple.txt".to_string()));

        let sent = prompts.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("QUESTION: What colour is the apple?"));
        assert!(sent[0].1.contains("Document: apple.txt (TXT)\nThe apple is red and crunchy."));
    }

    #[tokio::test]
    async fn ask_without_matches_still_calls_model() {
        let files = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let generator = RecordingGenerator::default();
        let prompts = generator.prompts.clone();
        let mut kb = kb_with(data.path(), Some(Box::new(generator)));
        kb.add_file(&write(files.path(), "a.txt", "nothing relevant"))
            .unwrap();

        let answer = kb.ask_with_model("zebra", "gemini-2.5-pro").await.unwrap();
        assert!(answer.documents.is_empty());
        assert_eq!(answer.model, "gemini-2.5-pro");
        assert!(prompts.lock().unwrap()[0].1.contains("DOCUMENTS:\n \n"));
    }

    #[tokio::test]
    async fn generator_errors_propagate() {
        let files = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let mut kb = kb_with(data.path(), Some(Box::new(FailingGenerator)));
        kb.add_file(&write(files.path(), "a.txt", "some text")).unwrap();
        let err = kb.ask("text").await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn find_needs_documents() {
        let data = tempfile::tempdir().unwrap();
        let kb = kb_with(data.path(), None);
        assert!(matches!(kb.find("q"), Err(QueryError::NoDocuments)));
    }
}
