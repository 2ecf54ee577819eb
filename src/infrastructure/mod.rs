//! 基础设施层
//!
//! 持有外部资源（模型客户端、本地存储、PDF 渲染库），只暴露能力，不认识业务流程。

pub mod page_renderer;
pub mod prompt_invoker;
pub mod store;

pub use page_renderer::{default_renderer, PageRenderer, RenderedPage};
pub use prompt_invoker::{invoke_json, OpenAiInvoker, PromptInvoker, PromptRequest, ResponseSchema};
pub use store::{FileStore, KeyValueStore, MemoryStore};
