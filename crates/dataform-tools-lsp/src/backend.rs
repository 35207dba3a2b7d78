//! LSP backend for Dataform projects
//!
//! Serves document symbols for reference calls, rename, completion,
//! go-to-definition, hover and diagnostics for SQLX files, plus the custom
//! panel requests.

use crate::completion::{completion_items, completion_options};
use crate::convert::{from_lsp_position, to_lsp_diagnostic, to_lsp_position, to_lsp_range};
use crate::navigation::{find_definition, reference_hover};
use crate::requests::{self, DependencyTreeParams, TableMetadataParams};
use crate::symbols::document_symbols;
use dataform_tools_core::{CompiledGraph, Config, TableMetadataMessage, TreeData};
use dataform_tools_graph::{document_diagnostics, DataformCompiler};
use dataform_tools_sqlx::{MatchMode, RenameEngine};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{Error, ErrorCode, Result};
use tower_lsp::lsp_types::{
    CompletionParams, CompletionResponse, DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse,
    GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverContents, HoverParams,
    HoverProviderCapability, InitializeParams, InitializeResult, InitializedParams, Location,
    MarkupContent, MarkupKind, MessageType, OneOf, Position, PrepareRenameResponse, Range, RenameOptions,
    RenameParams, ServerCapabilities, ServerInfo, TextDocumentPositionParams,
    TextDocumentSyncCapability, TextDocumentSyncKind, TextEdit, Url, WorkspaceEdit,
};
use tower_lsp::{Client, LanguageServer};

const NO_SYMBOL: &str = "No symbol at cursor to rename";

/// LSP backend
///
/// Keeps the open documents, the project config and the last compiled graph.
pub struct Backend {
    client: Client,
    /// Open documents (URI -> text)
    documents: Arc<RwLock<HashMap<Url, String>>>,
    config: Arc<RwLock<Config>>,
    /// Last successfully loaded compiled graph
    compiled: Arc<RwLock<Option<CompiledGraph>>>,
    /// Project root directory
    root: Arc<RwLock<Option<PathBuf>>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(RwLock::new(Config::default())),
            compiled: Arc::new(RwLock::new(None)),
            root: Arc::new(RwLock::new(None)),
        }
    }

    async fn load_config(&self) -> Config {
        let Some(root) = self.root.read().await.clone() else {
            return Config::default();
        };

        match Config::discover(&root) {
            Ok(config) => config,
            Err(e) => {
                self.client
                    .log_message(MessageType::WARNING, format!("Failed to load config: {}", e))
                    .await;
                Config {
                    project_root: root,
                    ..Config::default()
                }
            }
        }
    }

    /// Reload the compiled graph. A failed compile keeps the previous graph.
    async fn load_compiled(&self) {
        let Some(root) = self.root.read().await.clone() else {
            return;
        };
        let (compiler, compiled_json) = {
            let config = self.config.read().await;
            (
                DataformCompiler::new(config.compile.dataform_cli.clone()),
                config.compiled_json_path(),
            )
        };

        match compiler.load_or_compile(&root, compiled_json).await {
            Ok(graph) => {
                self.client
                    .log_message(
                        MessageType::INFO,
                        format!("Loaded compiled project ({} actions)", graph.actions().count()),
                    )
                    .await;
                *self.compiled.write().await = Some(graph);
            }
            Err(e) => {
                self.client
                    .log_message(MessageType::WARNING, format!("Failed to compile project: {}", e))
                    .await;
            }
        }
    }

    async fn document(&self, uri: &Url) -> Option<String> {
        self.documents.read().await.get(uri).cloned()
    }

    /// Path of a document relative to the project root, `/`-separated
    async fn relative_path(&self, uri: &Url) -> Option<String> {
        let path = uri.to_file_path().ok()?;
        let root = self.root.read().await.clone();
        Some(relative_to(root.as_deref(), &path))
    }

    async fn publish_diagnostics(&self, uri: Url) {
        let (Some(text), Some(file)) = (self.document(&uri).await, self.relative_path(&uri).await) else {
            return;
        };

        let diagnostics = {
            let config = self.config.read().await;
            let compiled = self.compiled.read().await;
            document_diagnostics(&file, &text, &config, compiled.as_ref())
        };

        self.client
            .publish_diagnostics(uri, diagnostics.iter().map(to_lsp_diagnostic).collect(), None)
            .await;
    }

    async fn rename_engine(&self) -> RenameEngine {
        RenameEngine::new(MatchMode::from_whole_word(self.config.read().await.rename.whole_word))
    }

    /// `dataform/tableMetadata`
    pub async fn table_metadata(&self, params: TableMetadataParams) -> Result<TableMetadataMessage> {
        let file = self
            .relative_path(&params.uri)
            .await
            .ok_or_else(|| Error::invalid_params("Document URI is not a file"))?;

        let compiled = self.compiled.read().await;
        let graph = compiled.as_ref().ok_or_else(no_compiled_project)?;
        Ok(requests::table_metadata(graph, &file))
    }

    /// `dataform/dependencyTree`
    pub async fn dependency_tree(&self, params: DependencyTreeParams) -> Result<TreeData> {
        let file = match &params.uri {
            Some(uri) => self.relative_path(uri).await,
            None => None,
        };

        let compiled = self.compiled.read().await;
        let graph = compiled.as_ref().ok_or_else(no_compiled_project)?;
        requests::dependency_tree(graph, file.as_deref(), params.root.as_deref(), params.direction)
    }
}

/// Range of the word a rename would replace
fn prepare_rename_range(engine: &RenameEngine, text: &str, position: Position) -> Result<PrepareRenameResponse> {
    let word = engine
        .word_at(text, from_lsp_position(position))
        .ok_or_else(|| Error::invalid_params(NO_SYMBOL))?;
    Ok(PrepareRenameResponse::Range(to_lsp_range(word.span)))
}

/// Edits replacing every occurrence of the word at `position` in one document
fn rename_edit(
    engine: &RenameEngine,
    uri: Url,
    text: &str,
    position: Position,
    new_name: &str,
) -> Result<WorkspaceEdit> {
    if new_name.is_empty() {
        return Err(Error::invalid_params("New name must not be empty"));
    }

    let edits: Vec<TextEdit> = engine
        .rename(text, from_lsp_position(position), new_name)
        .ok_or_else(|| Error::invalid_params(NO_SYMBOL))?
        .into_iter()
        .map(|edit| TextEdit::new(to_lsp_range(edit.span), edit.new_text))
        .collect();

    Ok(WorkspaceEdit {
        changes: Some(HashMap::from([(uri, edits)])),
        ..Default::default()
    })
}

fn no_compiled_project() -> Error {
    Error {
        code: ErrorCode::InternalError,
        message: "No compiled project available".into(),
        data: None,
    }
}

fn relative_to(root: Option<&Path>, path: &Path) -> String {
    let relative = root
        .and_then(|r| path.strip_prefix(r).ok())
        .unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| folder.uri.clone())
            .or(params.root_uri)
            .and_then(|uri| uri.to_file_path().ok());
        *self.root.write().await = root;

        *self.config.write().await = self.load_config().await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
                document_symbol_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Right(RenameOptions {
                    prepare_provider: Some(true),
                    work_done_progress_options: Default::default(),
                })),
                completion_provider: Some(completion_options()),
                definition_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "dataform-tools-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.load_compiled().await;
        self.client
            .log_message(MessageType::INFO, "Dataform tools LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents
            .write()
            .await
            .insert(uri.clone(), params.text_document.text);
        self.publish_diagnostics(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        // Full sync: the last change holds the whole document
        if let Some(change) = params.content_changes.into_iter().last() {
            self.documents.write().await.insert(uri.clone(), change.text);
            self.publish_diagnostics(uri).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        if let Some(text) = params.text {
            self.documents
                .write()
                .await
                .insert(params.text_document.uri.clone(), text);
        }

        *self.config.write().await = self.load_config().await;
        self.load_compiled().await;

        let open: Vec<Url> = self.documents.read().await.keys().cloned().collect();
        for uri in open {
            self.publish_diagnostics(uri).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.remove(&uri);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> Result<Option<DocumentSymbolResponse>> {
        let Some(text) = self.document(&params.text_document.uri).await else {
            return Ok(None);
        };
        Ok(Some(DocumentSymbolResponse::Nested(document_symbols(&text))))
    }

    async fn prepare_rename(&self, params: TextDocumentPositionParams) -> Result<Option<PrepareRenameResponse>> {
        let text = self.document(&params.text_document.uri).await.unwrap_or_default();
        let engine = self.rename_engine().await;
        prepare_rename_range(&engine, &text, params.position).map(Some)
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let uri = params.text_document_position.text_document.uri;
        let text = self.document(&uri).await.unwrap_or_default();
        let engine = self.rename_engine().await;
        rename_edit(
            &engine,
            uri,
            &text,
            params.text_document_position.position,
            &params.new_name,
        )
        .map(Some)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let Some(text) = self.document(&uri).await else {
            return Ok(None);
        };

        let ref_style = self.config.read().await.completion.ref_style;
        let compiled = self.compiled.read().await;
        let items = completion_items(&text, params.text_document_position.position, compiled.as_ref(), ref_style);

        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(CompletionResponse::Array(items)))
        }
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = from_lsp_position(params.text_document_position_params.position);

        let (Some(text), Some(root)) = (self.document(&uri).await, self.root.read().await.clone()) else {
            return Ok(None);
        };

        let response = find_definition(&root, &text, position).and_then(|target| {
            let uri = Url::from_file_path(&target.path).ok()?;
            let at = to_lsp_position(target.position);
            Some(GotoDefinitionResponse::Scalar(Location::new(uri, Range::new(at, at))))
        });
        Ok(response)
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = from_lsp_position(params.text_document_position_params.position);

        let Some(text) = self.document(&uri).await else {
            return Ok(None);
        };
        let compiled = self.compiled.read().await;
        let Some(graph) = compiled.as_ref() else {
            return Ok(None);
        };

        Ok(reference_hover(&text, position, graph).map(|value| Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SQLX: &str = "select user_id\nfrom ${ref(\"users\")}\nwhere user_id > 0\n";

    #[test]
    fn prepare_rename_needs_a_word() {
        let engine = RenameEngine::new(MatchMode::Substring);

        let err = prepare_rename_range(&engine, SQLX, Position::new(2, 15)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert_eq!(err.message, NO_SYMBOL);

        let range = prepare_rename_range(&engine, SQLX, Position::new(0, 9)).unwrap();
        assert_eq!(
            range,
            PrepareRenameResponse::Range(Range::new(Position::new(0, 7), Position::new(0, 14)))
        );
    }

    #[test]
    fn rename_rejects_empty_name_and_blank_cursor() {
        let engine = RenameEngine::new(MatchMode::Substring);
        let uri = Url::parse("file:///p/definitions/a.sqlx").unwrap();

        let empty = rename_edit(&engine, uri.clone(), SQLX, Position::new(0, 9), "").unwrap_err();
        assert_eq!(empty.code, ErrorCode::InvalidParams);

        let blank = rename_edit(&engine, uri.clone(), SQLX, Position::new(2, 15), "id").unwrap_err();
        assert_eq!(blank.message, NO_SYMBOL);
    }

    #[test]
    fn rename_edits_every_occurrence() {
        let engine = RenameEngine::new(MatchMode::Substring);
        let uri = Url::parse("file:///p/definitions/a.sqlx").unwrap();

        let edit = rename_edit(&engine, uri.clone(), SQLX, Position::new(2, 8), "uid").unwrap();
        let changes = edit.changes.unwrap();
        let edits = &changes[&uri];

        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].range, Range::new(Position::new(0, 7), Position::new(0, 14)));
        assert_eq!(edits[1].range, Range::new(Position::new(2, 6), Position::new(2, 13)));
        assert!(edits.iter().all(|e| e.new_text == "uid"));
    }

    #[test]
    fn relative_paths_strip_the_root() {
        let root = Path::new("/work/project");

        assert_eq!(
            relative_to(Some(root), Path::new("/work/project/definitions/a.sqlx")),
            "definitions/a.sqlx"
        );
        assert_eq!(relative_to(Some(root), Path::new("/elsewhere/b.sqlx")), "/elsewhere/b.sqlx");
        assert_eq!(relative_to(None, Path::new("/x/c.sqlx")), "/x/c.sqlx");
    }
}
