//! LSP server implementation using lsp-server (synchronous).
//!
//! Messages and debounced rebuilds are served from one loop, so a rebuild
//! never runs while a request is being answered.

use std::collections::HashMap;
use std::error::Error;
use std::time::Instant;

use crossbeam_channel::{at, never, select};
use lsp_server::{Connection, Message, Notification, Request, RequestId, Response};
use lsp_types::{
    CompletionOptions, CompletionParams, CompletionResponse, DeclarationCapability,
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverContents,
    HoverParams, HoverProviderCapability, ImplementationProviderCapability, InitializeParams,
    Location, MarkupContent, MarkupKind, MessageType, PublishDiagnosticsParams, ReferenceParams,
    SaveOptions, ServerCapabilities, ShowMessageParams, SignatureHelp, SignatureHelpOptions,
    SignatureHelpParams, TextDocumentPositionParams, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextDocumentSyncOptions, TextDocumentSyncSaveOptions, Uri,
    notification::{
        DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, DidSaveTextDocument,
        Notification as _, PublishDiagnostics, ShowMessage,
    },
    request::{
        Completion, GotoDeclaration, GotoDefinition, GotoImplementation, HoverRequest, References,
        SignatureHelpRequest,
    },
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use vyper_lsp::{
    Ast, CompletionHandler, Debouncer, Document, HoverHandler, Navigator, SignatureHandler,
};

use super::config::ServerConfig;
use super::tracing_layer::LspLayer;

/// An open document, its trees and its pending rebuild.
struct OpenDocument {
    uri: Uri,
    version: i32,
    document: Document,
    ast: Ast,
    /// Document version waiting to be rebuilt.
    rebuild: Debouncer<i32>,
}

/// Main LSP server state.
struct LspServer {
    connection: Connection,
    config: ServerConfig,
    documents: HashMap<String, OpenDocument>,
}

impl LspServer {
    fn new(connection: Connection, config: ServerConfig) -> Self {
        Self {
            connection,
            config,
            documents: HashMap::new(),
        }
    }

    fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let receiver = self.connection.receiver.clone();
        loop {
            let timeout = match self.next_deadline() {
                Some(deadline) => at(deadline),
                None => never(),
            };
            select! {
                recv(receiver) -> msg => {
                    if self.process_message(msg?)? {
                        return Ok(());
                    }
                }
                recv(timeout) -> _ => self.rebuild_due(Instant::now())?,
            }
        }
    }

    /// Process a single message. Returns `Ok(true)` if shutdown was requested.
    fn process_message(&mut self, msg: Message) -> Result<bool, Box<dyn Error + Send + Sync>> {
        match msg {
            Message::Request(req) => {
                if self.connection.handle_shutdown(&req)? {
                    return Ok(true);
                }
                self.handle_request(req)?;
            }
            Message::Response(_) => {
                // We don't send requests, so we shouldn't get responses
            }
            Message::Notification(notif) => {
                self.handle_notification(notif)?;
            }
        }
        Ok(false)
    }

    fn handle_request(&mut self, req: Request) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(method = %req.method, "Received request");

        if let Some((id, params)) = cast_request::<GotoDeclaration>(req.clone()) {
            let result = self.goto_declaration(params)?;
            self.respond(id, result)?;
        } else if let Some((id, params)) = cast_request::<GotoDefinition>(req.clone()) {
            let result = self.goto_declaration(params)?;
            self.respond(id, result)?;
        } else if let Some((id, params)) = cast_request::<GotoImplementation>(req.clone()) {
            let result = self.goto_implementation(params);
            self.respond(id, result)?;
        } else if let Some((id, params)) = cast_request::<References>(req.clone()) {
            let result = self.find_references(params);
            self.respond(id, result)?;
        } else if let Some((id, params)) = cast_request::<HoverRequest>(req.clone()) {
            let result = self.hover(params);
            self.respond(id, result)?;
        } else if let Some((id, params)) = cast_request::<Completion>(req.clone()) {
            let result = self.completion(params);
            self.respond(id, result)?;
        } else if let Some((id, params)) = cast_request::<SignatureHelpRequest>(req) {
            let result = self.signature_help(params);
            self.respond(id, result)?;
        }
        Ok(())
    }

    fn respond<T: serde::Serialize>(
        &self,
        id: RequestId,
        result: T,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let response = Response::new_ok(id, result);
        self.connection.sender.send(Message::Response(response))?;
        Ok(())
    }

    fn handle_notification(
        &mut self,
        notif: Notification,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(params) = cast_notification::<DidOpenTextDocument>(notif.clone()) {
            self.did_open(params);
        } else if let Some(params) = cast_notification::<DidChangeTextDocument>(notif.clone()) {
            self.did_change(params);
        } else if let Some(params) = cast_notification::<DidSaveTextDocument>(notif.clone()) {
            self.did_save(params);
        } else if let Some(params) = cast_notification::<DidCloseTextDocument>(notif) {
            self.did_close(params)?;
        }
        Ok(())
    }

    fn did_open(&mut self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        tracing::info!(uri = item.uri.as_str(), "Document opened");

        let mut open = OpenDocument {
            document: Document::new(item.uri.as_str(), &item.text),
            uri: item.uri,
            version: item.version,
            ast: Ast::new(),
            rebuild: Debouncer::new(self.config.debounce()),
        };
        open.rebuild.call(open.version, Instant::now());
        self.documents.insert(open.uri.as_str().to_string(), open);
    }

    fn did_change(&mut self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(open) = self.documents.get_mut(uri.as_str()) else {
            tracing::warn!(uri = uri.as_str(), "Change for a document that is not open");
            return;
        };
        for change in params.content_changes {
            if let Err(error) = open.document.apply_change(change.range, &change.text) {
                tracing::warn!(%error, uri = uri.as_str(), "Dropping content change");
            }
        }
        open.version = params.text_document.version;
        open.rebuild.call(open.version, Instant::now());
    }

    fn did_save(&mut self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let Some(open) = self.documents.get_mut(uri.as_str()) else {
            return;
        };
        if let Some(text) = params.text {
            open.document.replace(&text);
        }
        open.rebuild.call(open.version, Instant::now());
    }

    fn did_close(
        &mut self,
        params: DidCloseTextDocumentParams,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let uri = params.text_document.uri;
        tracing::info!(uri = uri.as_str(), "Document closed");
        self.documents.remove(uri.as_str());

        // Clear diagnostics
        self.publish(PublishDiagnosticsParams {
            uri,
            diagnostics: vec![],
            version: None,
        })
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.documents
            .values()
            .filter_map(|open| open.rebuild.deadline())
            .min()
    }

    /// Rebuild every document whose quiet window has passed.
    fn rebuild_due(&mut self, now: Instant) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut published = Vec::new();
        for open in self.documents.values_mut() {
            if let Some(version) = open.rebuild.poll(now) {
                published.push(Self::rebuild(open, version));
            }
        }
        for params in published {
            self.publish(params)?;
        }
        Ok(())
    }

    /// Rebuild every document with a pending change, ignoring deadlines.
    #[cfg(test)]
    fn flush_rebuilds(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut published = Vec::new();
        for open in self.documents.values_mut() {
            if let Some(version) = open.rebuild.flush() {
                published.push(Self::rebuild(open, version));
            }
        }
        for params in published {
            self.publish(params)?;
        }
        Ok(())
    }

    fn rebuild(open: &mut OpenDocument, version: i32) -> PublishDiagnosticsParams {
        let diagnostics = open.ast.build(&open.document);
        tracing::debug!(
            uri = open.uri.as_str(),
            version,
            state = %open.ast.state(),
            diagnostics = diagnostics.len(),
            "Rebuilt document"
        );
        PublishDiagnosticsParams {
            uri: open.uri.clone(),
            diagnostics,
            version: Some(version),
        }
    }

    fn publish(
        &self,
        params: PublishDiagnosticsParams,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let notif = Notification::new(PublishDiagnostics::METHOD.to_string(), params);
        self.connection.sender.send(Message::Notification(notif))?;
        Ok(())
    }

    fn show_message(
        &self,
        typ: MessageType,
        message: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let params = ShowMessageParams {
            typ,
            message: message.to_string(),
        };
        let notif = Notification::new(ShowMessage::METHOD.to_string(), params);
        self.connection.sender.send(Message::Notification(notif))?;
        Ok(())
    }

    fn document_at(&self, params: &TextDocumentPositionParams) -> Option<&OpenDocument> {
        self.documents.get(params.text_document.uri.as_str())
    }

    fn goto_declaration(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>, Box<dyn Error + Send + Sync>> {
        let position = params.text_document_position_params.position;
        tracing::debug!(
            line = position.line,
            character = position.character,
            "Go to Declaration request"
        );

        let range = self
            .document_at(&params.text_document_position_params)
            .and_then(|open| {
                let range = Navigator::new(&open.ast).find_declaration(&open.document, position)?;
                Some(Location {
                    uri: open.uri.clone(),
                    range,
                })
            });
        match range {
            Some(location) => Ok(Some(GotoDefinitionResponse::Scalar(location))),
            None => {
                self.show_message(MessageType::INFO, "No declaration found")?;
                Ok(None)
            }
        }
    }

    fn goto_implementation(&self, params: GotoDefinitionParams) -> Option<GotoDefinitionResponse> {
        let position = params.text_document_position_params.position;
        tracing::debug!(
            line = position.line,
            character = position.character,
            "Go to Implementation request"
        );

        let open = self.document_at(&params.text_document_position_params)?;
        let range = Navigator::new(&open.ast).find_implementation(&open.document, position)?;
        Some(GotoDefinitionResponse::Scalar(Location {
            uri: open.uri.clone(),
            range,
        }))
    }

    fn find_references(&self, params: ReferenceParams) -> Option<Vec<Location>> {
        let position = params.text_document_position.position;
        tracing::debug!(
            line = position.line,
            character = position.character,
            "Find References request"
        );

        let open = self.document_at(&params.text_document_position)?;
        let locations: Vec<Location> = Navigator::new(&open.ast)
            .find_references(&open.document, position)
            .into_iter()
            .map(|range| Location {
                uri: open.uri.clone(),
                range,
            })
            .collect();
        tracing::debug!(count = locations.len(), "Found references");
        Some(locations)
    }

    fn hover(&self, params: HoverParams) -> Option<Hover> {
        let position = params.text_document_position_params.position;
        tracing::debug!(
            line = position.line,
            character = position.character,
            "Hover request"
        );

        let open = self.document_at(&params.text_document_position_params)?;
        let value = HoverHandler::new(&open.ast).hover_info(&open.document, position)?;
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: None,
        })
    }

    fn completion(&self, params: CompletionParams) -> Option<CompletionResponse> {
        let position = params.text_document_position.position;
        let trigger = params
            .context
            .as_ref()
            .and_then(|context| context.trigger_character.as_deref());
        tracing::debug!(
            line = position.line,
            character = position.character,
            trigger,
            "Completion request"
        );

        let open = self.document_at(&params.text_document_position)?;
        let list = CompletionHandler::new(&open.ast).complete(&open.document, position, trigger);
        Some(CompletionResponse::List(list))
    }

    fn signature_help(&self, params: SignatureHelpParams) -> Option<SignatureHelp> {
        let position = params.text_document_position_params.position;
        tracing::debug!(
            line = position.line,
            character = position.character,
            "Signature help request"
        );

        let open = self.document_at(&params.text_document_position_params)?;
        SignatureHandler::new(&open.ast).signature_help(&open.document, position)
    }
}

/// Get the server capabilities for the Vyper LSP server.
fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::INCREMENTAL),
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(true),
            })),
            ..Default::default()
        })),
        declaration_provider: Some(DeclarationCapability::Simple(true)),
        definition_provider: Some(lsp_types::OneOf::Left(true)),
        implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
        references_provider: Some(lsp_types::OneOf::Left(true)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        signature_help_provider: Some(SignatureHelpOptions {
            trigger_characters: Some(vec!["(".to_string()]),
            retrigger_characters: Some(vec![",".to_string(), " ".to_string()]),
            work_done_progress_options: Default::default(),
        }),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![
                ":".to_string(),
                ".".to_string(),
                "@".to_string(),
                " ".to_string(),
            ]),
            resolve_provider: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Initialize the LSP server with the given connection.
///
/// This performs the LSP initialize handshake and returns a ready-to-run server.
fn initialize_server(
    connection: Connection,
    debounce_ms: Option<u64>,
) -> Result<LspServer, Box<dyn Error + Send + Sync>> {
    let capabilities = server_capabilities();
    let server_capabilities = serde_json::to_value(&capabilities)?;
    let init_params = connection.initialize(server_capabilities)?;
    let params: InitializeParams = serde_json::from_value(init_params)?;
    let config = ServerConfig::from_initialization_options(params.initialization_options)
        .with_debounce_ms(debounce_ms);
    tracing::debug!(debounce_ms = config.debounce_ms, "Server configured");
    Ok(LspServer::new(connection, config))
}

/// Settings for [`serve`] that come from the command line.
#[derive(Clone, Debug, Default)]
pub struct ServeOptions {
    pub tcp: Option<String>,
    pub log_level: String,
    pub debounce_ms: Option<u64>,
}

/// Start the LSP server.
pub fn serve(options: ServeOptions) -> Result<(), Box<dyn Error + Send + Sync>> {
    let (connection, io_threads) = match &options.tcp {
        Some(addr) => Connection::listen(addr.as_str())?,
        None => Connection::stdio(),
    };

    // stdout carries the protocol, so local logs go to stderr
    let (lsp_layer, handle) = LspLayer::new(&connection);
    let filter = EnvFilter::try_new(&options.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(lsp_layer)
        .init();

    let mut server = initialize_server(connection, options.debounce_ms)?;
    handle.mark_initialized();
    tracing::info!("Vyper language server initialized");
    server.run()?;

    io_threads.join()?;
    Ok(())
}

/// Cast a request to a specific type.
fn cast_request<R: lsp_types::request::Request>(req: Request) -> Option<(RequestId, R::Params)> {
    if req.method == R::METHOD {
        let params = serde_json::from_value(req.params).ok()?;
        Some((req.id, params))
    } else {
        None
    }
}

/// Cast a notification to a specific type.
fn cast_notification<N: lsp_types::notification::Notification>(
    notif: Notification,
) -> Option<N::Params> {
    if notif.method == N::METHOD {
        serde_json::from_value(notif.params).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use lsp_types::request::Request as _;

    use lsp_types::{
        CompletionContext, CompletionTriggerKind, Position, Range, ReferenceContext,
        TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
        VersionedTextDocumentIdentifier,
    };

    static REQUEST_ID: AtomicI32 = AtomicI32::new(1);

    fn next_request_id() -> RequestId {
        RequestId::from(REQUEST_ID.fetch_add(1, Ordering::SeqCst))
    }

    //                               0         1         2         3
    //                               0123456789012345678901234567890123456789
    const SOURCE: &str = "struct Point:
    x: int128
    y: int128

owner: public(address)
LIMIT: constant(uint256) = 10

@internal
def _bump(p: Point, amount: uint256) -> uint256:
    return amount + LIMIT

@external
def run():
    self.owner = msg.sender
    x: uint256 = self._bump(Point(x=1, y=2), 3)
";

    /// Test harness that creates a server and client connection pair.
    struct TestHarness {
        server: LspServer,
        client: Connection,
    }

    impl TestHarness {
        fn new() -> Self {
            use lsp_types::request::{Initialize, Request as _};

            let (server_conn, client_conn) = Connection::memory();

            let init_params = InitializeParams {
                initialization_options: Some(serde_json::json!({ "debounceMs": 50 })),
                ..Default::default()
            };
            let init_request = lsp_server::Request::new(
                RequestId::from(0),
                Initialize::METHOD.to_string(),
                init_params,
            );
            client_conn.sender.send(Message::Request(init_request)).unwrap();

            // connection.initialize() waits for this before returning
            let initialized = Notification::new("initialized".to_string(), serde_json::json!({}));
            client_conn.sender.send(Message::Notification(initialized)).unwrap();

            let server = initialize_server(server_conn, None).unwrap();

            // Client receives initialize response
            let _response = client_conn.receiver.recv().unwrap();

            Self {
                server,
                client: client_conn,
            }
        }

        fn notify<N: lsp_types::notification::Notification>(&mut self, params: N::Params)
        where
            N::Params: serde::Serialize,
        {
            let notif = Notification::new(N::METHOD.to_string(), params);
            self.client.sender.send(Message::Notification(notif)).unwrap();
            let msg = self.server.connection.receiver.recv().unwrap();
            self.server.process_message(msg).unwrap();
        }

        /// Run pending rebuilds and return the diagnostics they published.
        fn rebuild(&mut self) -> Vec<PublishDiagnosticsParams> {
            self.server.flush_rebuilds().unwrap();
            self.client
                .receiver
                .try_iter()
                .filter_map(|msg| match msg {
                    Message::Notification(notif) if notif.method == PublishDiagnostics::METHOD => {
                        serde_json::from_value(notif.params).ok()
                    }
                    _ => None,
                })
                .collect()
        }

        /// Send a didOpen notification and build the document.
        fn open_document(&mut self, uri: &Uri, text: &str) -> Vec<PublishDiagnosticsParams> {
            self.notify::<DidOpenTextDocument>(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "vyper".to_string(),
                    version: 1,
                    text: text.to_string(),
                },
            });
            self.rebuild()
        }

        /// Send a request and get the response.
        fn request<R: lsp_types::request::Request>(&mut self, params: R::Params) -> R::Result
        where
            R::Params: serde::Serialize,
            R::Result: serde::de::DeserializeOwned,
        {
            let id = next_request_id();
            let req = Request::new(id.clone(), R::METHOD.to_string(), params);
            self.client.sender.send(Message::Request(req)).unwrap();

            let msg = self.server.connection.receiver.recv().unwrap();
            self.server.process_message(msg).unwrap();

            // Responses may be preceded by showMessage notifications
            loop {
                match self.client.receiver.recv().unwrap() {
                    Message::Response(resp) => {
                        assert_eq!(resp.id, id);
                        assert!(resp.error.is_none(), "Request failed: {:?}", resp.error);
                        return serde_json::from_value(resp.result.unwrap()).unwrap();
                    }
                    Message::Notification(_) => continue,
                    other => panic!("Expected response message, got {:?}", other),
                }
            }
        }
    }

    fn test_uri(name: &str) -> Uri {
        format!("file:///test/{}.vy", name).parse().unwrap()
    }

    fn position_params(uri: &Uri, line: u32, character: u32) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position: Position { line, character },
        }
    }

    fn goto_params(uri: &Uri, line: u32, character: u32) -> GotoDefinitionParams {
        GotoDefinitionParams {
            text_document_position_params: position_params(uri, line, character),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        }
    }

    fn scalar_range(response: Option<GotoDefinitionResponse>) -> Range {
        match response {
            Some(GotoDefinitionResponse::Scalar(location)) => location.range,
            other => panic!("Expected a single location, got {:?}", other),
        }
    }

    #[test]
    fn test_open_publishes_diagnostics_after_rebuild() {
        let mut harness = TestHarness::new();
        let uri = test_uri("open_msg");
        let published = harness.open_document(&uri, SOURCE);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].uri, uri);
        assert_eq!(published[0].version, Some(1));
        assert!(published[0].diagnostics.is_empty(), "{:?}", published[0].diagnostics);
    }

    #[test]
    fn test_config_from_initialization_options() {
        let harness = TestHarness::new();
        assert_eq!(harness.server.config.debounce_ms, 50);
    }

    #[test]
    fn test_goto_declaration_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("declaration_msg");
        harness.open_document(&uri, SOURCE);

        // `_bump` in `self._bump(...)`
        let range = scalar_range(harness.request::<GotoDeclaration>(goto_params(&uri, 14, 24)));
        assert_eq!(range.start.line, 8);

        // definition uses the same resolver
        let range = scalar_range(harness.request::<GotoDefinition>(goto_params(&uri, 13, 10)));
        assert_eq!(range.start, Position { line: 4, character: 0 });
    }

    #[test]
    fn test_goto_declaration_not_found_shows_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("declaration_missing_msg");
        harness.open_document(&uri, SOURCE);

        let id = next_request_id();
        let req = Request::new(id, GotoDeclaration::METHOD.to_string(), goto_params(&uri, 13, 20));
        harness.client.sender.send(Message::Request(req)).unwrap();
        let msg = harness.server.connection.receiver.recv().unwrap();
        harness.server.process_message(msg).unwrap();

        match harness.client.receiver.recv().unwrap() {
            Message::Notification(notif) => {
                assert_eq!(notif.method, ShowMessage::METHOD);
                let params: ShowMessageParams = serde_json::from_value(notif.params).unwrap();
                assert_eq!(params.message, "No declaration found");
            }
            other => panic!("Expected notification, got {:?}", other),
        }
        match harness.client.receiver.recv().unwrap() {
            Message::Response(resp) => assert_eq!(resp.result, Some(serde_json::Value::Null)),
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_goto_implementation_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("implementation_msg");
        harness.open_document(&uri, SOURCE);

        let range = scalar_range(harness.request::<GotoImplementation>(goto_params(&uri, 14, 24)));
        assert_eq!(range.start.line, 8);
    }

    #[test]
    fn test_find_references_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("references_msg");
        harness.open_document(&uri, SOURCE);

        let params = ReferenceParams {
            text_document_position: position_params(&uri, 8, 6),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: ReferenceContext {
                include_declaration: false,
            },
        };
        let refs = harness.request::<References>(params).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].uri, uri);
        assert_eq!(refs[0].range.start.line, 14);
    }

    #[test]
    fn test_hover_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("hover_msg");
        harness.open_document(&uri, SOURCE);

        let params = HoverParams {
            text_document_position_params: position_params(&uri, 13, 10),
            work_done_progress_params: Default::default(),
        };
        let hover = harness.request::<HoverRequest>(params).unwrap();
        match hover.contents {
            HoverContents::Markup(markup) => {
                assert_eq!(markup.kind, MarkupKind::Markdown);
                assert_eq!(markup.value, "(State Variable) **owner** : **address**");
            }
            other => panic!("Expected markup, got {:?}", other),
        }
    }

    #[test]
    fn test_completion_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("completion_msg");
        harness.open_document(&uri, SOURCE);

        let params = CompletionParams {
            text_document_position: position_params(&uri, 13, 9),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: Some(CompletionContext {
                trigger_kind: CompletionTriggerKind::TRIGGER_CHARACTER,
                trigger_character: Some(".".to_string()),
            }),
        };
        let response = harness.request::<Completion>(params).unwrap();
        let CompletionResponse::List(list) = response else {
            panic!("Expected a completion list");
        };
        let labels: Vec<_> = list.items.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, vec!["_bump", "owner"]);
    }

    #[test]
    fn test_signature_help_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("signature_msg");
        harness.open_document(&uri, SOURCE);

        // after the comma that follows `Point(x=1, y=2)`
        let params = SignatureHelpParams {
            context: None,
            text_document_position_params: position_params(&uri, 14, 45),
            work_done_progress_params: Default::default(),
        };
        let help = harness.request::<SignatureHelpRequest>(params).unwrap();
        assert_eq!(
            help.signatures[0].label,
            "_bump(p: Point, amount: uint256) -> uint256"
        );
        assert_eq!(help.active_parameter, Some(1));
    }

    #[test]
    fn test_did_change_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("change_msg");
        harness.open_document(&uri, "owner: address\n");

        // rename `owner` to `admin` and add a function using it
        harness.notify::<DidChangeTextDocument>(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: uri.clone(),
                version: 2,
            },
            content_changes: vec![
                TextDocumentContentChangeEvent {
                    range: Some(Range {
                        start: Position { line: 0, character: 0 },
                        end: Position { line: 0, character: 5 },
                    }),
                    range_length: None,
                    text: "admin".to_string(),
                },
                TextDocumentContentChangeEvent {
                    range: Some(Range {
                        start: Position { line: 1, character: 0 },
                        end: Position { line: 1, character: 0 },
                    }),
                    range_length: None,
                    text: "\n@external\ndef touch():\n    self.admin = msg.sender\n".to_string(),
                },
            ],
        });
        // nothing is rebuilt until the quiet window passes
        assert!(harness.server.documents[uri.as_str()].rebuild.is_pending());

        let published = harness.rebuild();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].version, Some(2));
        assert!(published[0].diagnostics.is_empty(), "{:?}", published[0].diagnostics);

        let range = scalar_range(harness.request::<GotoDeclaration>(goto_params(&uri, 4, 10)));
        assert_eq!(range.start, Position { line: 0, character: 0 });
    }

    #[test]
    fn test_rapid_changes_rebuild_once() {
        let mut harness = TestHarness::new();
        let uri = test_uri("debounce_msg");
        harness.open_document(&uri, "x: uint256\n");

        for (version, text) in [(2, "x: uint25\n"), (3, "x: uint2\n"), (4, "x: bool\n")] {
            harness.notify::<DidChangeTextDocument>(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: text.to_string(),
                }],
            });
        }

        // a poll before the window passes does nothing
        harness.server.rebuild_due(Instant::now()).unwrap();
        assert!(harness.client.receiver.try_recv().is_err());

        let deadline = harness.server.next_deadline().unwrap();
        harness.server.rebuild_due(deadline).unwrap();
        let published: Vec<PublishDiagnosticsParams> = harness
            .client
            .receiver
            .try_iter()
            .filter_map(|msg| match msg {
                Message::Notification(notif) => serde_json::from_value(notif.params).ok(),
                _ => None,
            })
            .collect();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].version, Some(4));
        assert!(published[0].diagnostics.is_empty());
    }

    #[test]
    fn test_syntax_error_publishes_diagnostic() {
        let mut harness = TestHarness::new();
        let uri = test_uri("error_msg");
        let published = harness.open_document(&uri, "@internal\ndef foo(:\n");
        assert_eq!(published[0].diagnostics.len(), 1);
        assert!(published[0].diagnostics[0].message.starts_with("SyntaxException"));
    }

    #[test]
    fn test_did_close_via_message() {
        let mut harness = TestHarness::new();
        let uri = test_uri("close_msg");
        harness.open_document(&uri, "x: uint256\n");

        harness.notify::<DidCloseTextDocument>(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
        });

        match harness.client.receiver.recv().unwrap() {
            Message::Notification(notif) => {
                assert_eq!(notif.method, PublishDiagnostics::METHOD);
                let params: PublishDiagnosticsParams =
                    serde_json::from_value(notif.params).unwrap();
                assert_eq!(params.uri, uri);
                assert!(params.diagnostics.is_empty(), "Should clear diagnostics");
            }
            other => panic!("Expected notification, got {:?}", other),
        }
        assert!(harness.server.documents.is_empty());
    }

    #[test]
    fn test_capabilities() {
        let capabilities = server_capabilities();
        let triggers = capabilities.completion_provider.unwrap().trigger_characters.unwrap();
        assert_eq!(triggers, vec![":", ".", "@", " "]);
        assert!(capabilities.declaration_provider.is_some());
        assert!(capabilities.implementation_provider.is_some());
    }
}
