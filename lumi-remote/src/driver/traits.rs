use super::actions::{By, DeviceCommand, ElementId, Rect, TouchChain, W3cActions};
use super::error::DriverResult;
use async_trait::async_trait;

/// Live connection to an automation server controlling one running app
///
/// This trait is the only thing the interaction layer knows about the remote
/// side. Every method maps to a single protocol round trip; none of them
/// retry or wait on their own. Implementations must be usable from a single
/// task at a time; the scenario that owns the session is the only caller.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Server-assigned session id
    fn session_id(&self) -> &str;

    /// Find the first element matching a query
    async fn find_element(&self, by: &By) -> DriverResult<ElementId>;

    /// Find every element matching a query (empty when none match)
    async fn find_elements(&self, by: &By) -> DriverResult<Vec<ElementId>>;

    /// Bounding box of an element
    async fn element_rect(&self, element: &ElementId) -> DriverResult<Rect>;

    /// Tap an element
    async fn click_element(&self, element: &ElementId) -> DriverResult<()>;

    /// Clear an editable element
    async fn clear_element(&self, element: &ElementId) -> DriverResult<()>;

    /// Send text to an element
    async fn send_keys(&self, element: &ElementId, text: &str) -> DriverResult<()>;

    /// Read an element attribute. `None` when the attribute is unset.
    async fn element_attribute(&self, element: &ElementId, name: &str)
        -> DriverResult<Option<String>>;

    /// Displayed label of an element
    async fn element_text(&self, element: &ElementId) -> DriverResult<String>;

    /// Whether the element is displayed on screen
    async fn is_displayed(&self, element: &ElementId) -> DriverResult<bool>;

    /// Perform a W3C pointer action sequence
    async fn perform_actions(&self, actions: &W3cActions) -> DriverResult<()>;

    /// Perform a legacy single-shot touch action
    async fn perform_touch(&self, chain: &TouchChain) -> DriverResult<()>;

    /// Execute a raw device command such as a hardware key press
    async fn execute_device_command(&self, command: &DeviceCommand) -> DriverResult<()>;

    /// Current UI hierarchy as served by the automation backend
    async fn page_source(&self) -> DriverResult<String>;

    /// Window size as (width, height)
    async fn window_size(&self) -> DriverResult<(u32, u32)>;

    /// PNG screenshot bytes
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// End the session on the server
    async fn quit(&self) -> DriverResult<()>;
}
