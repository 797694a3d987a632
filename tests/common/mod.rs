#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chameleon_lib::host::{BrowserHost, TabId, WindowSpec};
use chameleon_lib::models::{PageMessage, Response};
use chameleon_lib::page::{CaptureAgent, Document, NodeId, Rect};
use chameleon_lib::services::config_service::Config;
use chameleon_lib::services::coordinator::Coordinator;
use chameleon_lib::services::store::{MemoryStore, SettingsStore};
use chameleon_lib::{HostError, Router};

pub struct Tab {
    pub doc: Document,
    pub agent: Option<CaptureAgent>,
}

/// In-process browser: tabs hold a document and, once injected, a capture agent.
#[derive(Default)]
pub struct FakeHost {
    pub tabs: Mutex<HashMap<TabId, Tab>>,
    pub active: Mutex<Option<TabId>>,
    pub popup_supported: AtomicBool,
    pub fail_injection: AtomicBool,
    pub injections: AtomicUsize,
    pub settings_opened: AtomicUsize,
    pub windows: Mutex<Vec<WindowSpec>>,
    /// Reply every agent gives instead of handling the message.
    pub agent_reply: Mutex<Option<Response>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            popup_supported: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Add a tab and make it the active one.
    pub fn open_tab(&self, id: TabId, mut doc: Document, injected: bool) {
        let agent = injected.then(|| {
            let mut agent = CaptureAgent::default();
            agent.install(&mut doc);
            agent
        });
        self.tabs.lock().unwrap().insert(id, Tab { doc, agent });
        *self.active.lock().unwrap() = Some(id);
    }

    pub fn with_tab<R>(&self, id: TabId, f: impl FnOnce(&mut Tab) -> R) -> R {
        let mut tabs = self.tabs.lock().unwrap();
        f(tabs.get_mut(&id).expect("tab exists"))
    }

    pub fn injections(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    pub fn settings_opened(&self) -> usize {
        self.settings_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserHost for FakeHost {
    async fn active_tab(&self) -> Option<TabId> {
        *self.active.lock().unwrap()
    }

    async fn send_to_tab(&self, tab: TabId, message: PageMessage) -> Result<Response, HostError> {
        let canned = self.agent_reply.lock().unwrap().clone();
        let mut tabs = self.tabs.lock().unwrap();
        let Tab { doc, agent } = tabs.get_mut(&tab).ok_or(HostError::NoReceiver(tab))?;
        match (agent, canned) {
            (Some(_), Some(reply)) => Ok(reply),
            (Some(agent), None) => Ok(agent.handle_message(doc, message)),
            (None, _) => Err(HostError::NoReceiver(tab)),
        }
    }

    async fn inject_agent(&self, tab: TabId) -> Result<(), HostError> {
        self.injections.fetch_add(1, Ordering::SeqCst);
        if self.fail_injection.load(Ordering::SeqCst) {
            return Err(HostError::Failed("scripting blocked on this page".to_string()));
        }
        let mut tabs = self.tabs.lock().unwrap();
        let Tab { doc, agent } = tabs
            .get_mut(&tab)
            .ok_or_else(|| HostError::Failed(format!("no tab {tab}")))?;
        let mut fresh = CaptureAgent::default();
        fresh.install(doc);
        *agent = Some(fresh);
        Ok(())
    }

    async fn open_settings(&self) -> Result<(), HostError> {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_review_popup(&self) -> Result<(), HostError> {
        if self.popup_supported.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HostError::Unsupported("toolbar popup".to_string()))
        }
    }

    async fn open_window(&self, spec: WindowSpec) -> Result<(), HostError> {
        self.windows.lock().unwrap().push(spec);
        Ok(())
    }
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub store: Arc<MemoryStore>,
    pub router: Arc<Router>,
}

pub fn harness(base_url: Option<String>) -> Harness {
    let host = Arc::new(FakeHost::new());
    let store = Arc::new(MemoryStore::new());
    let config = Config {
        base_url,
        ..Default::default()
    };
    let coordinator = Coordinator::new(
        config,
        store.clone() as Arc<dyn SettingsStore>,
        host.clone() as Arc<dyn BrowserHost>,
    )
    .expect("coordinator");
    Harness {
        host,
        store,
        router: Arc::new(Router::with_coordinator(Arc::new(coordinator))),
    }
}

/// A mail page with one compose box holding `content` laid out on a single line.
pub fn compose_page(content: &str) -> (Document, NodeId, NodeId) {
    let mut doc = Document::new();
    let region = doc.create_element("div");
    doc.set_attribute(region, "contenteditable", "true");
    doc.set_attribute(region, "aria-label", "Message Body");
    doc.append_child(doc.root(), region);
    let text = doc.create_text(content);
    doc.append_child(region, text);
    doc.set_rect(text, Rect::new(10.0, 200.0, 300.0, 18.0));
    (doc, region, text)
}
