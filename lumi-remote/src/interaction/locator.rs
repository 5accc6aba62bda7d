//! Element resolution through an ordered chain of lookup strategies
//!
//! The same logical element is addressable in different ways depending on
//! how the app was rendered and packaged: React Native exposes `testID` as a
//! `resource-id` attribute, native builds prefix ids with the package
//! namespace, some backends reject XPath entirely. A [`LocatorSpec`] lists
//! the ways to try, and [`LocatorResolver`] walks them until one matches.

use crate::driver::{By, DriverError, ElementId, Rect, RemoteSession};
use std::collections::HashMap;
use std::fmt;

/// One way of finding an element from its semantic key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorStrategy {
    /// `//*[@attribute='key']`
    AttributePredicate { attribute: String },
    /// `id=key`
    BareId,
    /// `id=namespace:id/key`
    QualifiedId { namespace: String },
    /// `accessibility id=key`
    AccessibilityId,
    /// `//*[contains(@text, 'key')]`
    TextContains,
}

impl LocatorStrategy {
    /// Concrete query for a key
    pub fn query(&self, key: &str) -> By {
        match self {
            LocatorStrategy::AttributePredicate { attribute } => {
                By::XPath(format!("//*[@{}={}]", attribute, xpath_literal(key)))
            }
            LocatorStrategy::BareId => By::Id(key.to_string()),
            LocatorStrategy::QualifiedId { namespace } => {
                By::Id(format!("{}:id/{}", namespace, key))
            }
            LocatorStrategy::AccessibilityId => By::AccessibilityId(key.to_string()),
            LocatorStrategy::TextContains => {
                By::XPath(format!("//*[contains(@text, {})]", xpath_literal(key)))
            }
        }
    }

    /// Short label for narrative output
    pub fn label(&self) -> &'static str {
        match self {
            LocatorStrategy::AttributePredicate { .. } => "XPath",
            LocatorStrategy::BareId => "direct ID",
            LocatorStrategy::QualifiedId { .. } => "full resource-id",
            LocatorStrategy::AccessibilityId => "accessibility ID",
            LocatorStrategy::TextContains => "text",
        }
    }
}

/// Quote a string for use inside an XPath expression
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// A semantic key and the ordered strategies used to find it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorSpec {
    key: String,
    chain: Vec<LocatorStrategy>,
}

impl LocatorSpec {
    pub fn new(key: &str, chain: Vec<LocatorStrategy>) -> Self {
        Self {
            key: key.to_string(),
            chain,
        }
    }

    /// Attribute predicate, then bare id, then the namespace-qualified id
    pub fn standard(key: &str, attribute: &str, namespace: Option<&str>) -> Self {
        let mut chain = vec![
            LocatorStrategy::AttributePredicate {
                attribute: attribute.to_string(),
            },
            LocatorStrategy::BareId,
        ];
        if let Some(ns) = namespace {
            chain.push(LocatorStrategy::QualifiedId {
                namespace: ns.to_string(),
            });
        }
        Self::new(key, chain)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn chain(&self) -> &[LocatorStrategy] {
        &self.chain
    }
}

/// A resolved element
///
/// Not `Clone`: a handle belongs to the step that resolved it, and actions
/// that change the UI consume it. The bounding box is the one observed at
/// resolution time.
#[derive(Debug)]
pub struct UiElementHandle {
    key: String,
    element: ElementId,
    rect: Rect,
    matched_by: LocatorStrategy,
}

impl UiElementHandle {
    pub fn new(key: &str, element: ElementId, rect: Rect, matched_by: LocatorStrategy) -> Self {
        Self {
            key: key.to_string(),
            element,
            rect,
            matched_by,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn element(&self) -> &ElementId {
        &self.element
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn matched_by(&self) -> &LocatorStrategy {
        &self.matched_by
    }
}

/// Every strategy that was tried, with why it failed
#[derive(Debug)]
pub struct LocateFailure {
    pub key: String,
    pub attempts: Vec<(LocatorStrategy, String)>,
}

impl fmt::Display for LocateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "'{}' has no lookup strategies", self.key);
        }
        write!(f, "'{}' not found (", self.key)?;
        for (i, (strategy, reason)) in self.attempts.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", strategy.label(), reason)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocatorResolver;

impl LocatorResolver {
    pub fn new() -> Self {
        Self
    }

    async fn try_strategy(
        session: &dyn RemoteSession,
        key: &str,
        strategy: &LocatorStrategy,
    ) -> Result<UiElementHandle, DriverError> {
        let by = strategy.query(key);
        let element = session.find_element(&by).await?;
        let rect = session.element_rect(&element).await?;
        Ok(UiElementHandle::new(key, element, rect, strategy.clone()))
    }

    /// Try each strategy in order; the first match wins
    pub async fn resolve(
        &self,
        session: &dyn RemoteSession,
        spec: &LocatorSpec,
    ) -> Result<UiElementHandle, LocateFailure> {
        let mut attempts = Vec::with_capacity(spec.chain().len());

        for strategy in spec.chain() {
            match Self::try_strategy(session, spec.key(), strategy).await {
                Ok(handle) => {
                    log::debug!("Resolved '{}' via {}", spec.key(), strategy.label());
                    return Ok(handle);
                }
                Err(e) => {
                    log::debug!("'{}' via {} failed: {}", spec.key(), strategy.label(), e);
                    attempts.push((strategy.clone(), e.to_string()));
                }
            }
        }

        Err(LocateFailure {
            key: spec.key().to_string(),
            attempts,
        })
    }

    /// Resolve or give up quietly
    pub async fn locate(
        &self,
        session: &dyn RemoteSession,
        spec: &LocatorSpec,
    ) -> Option<UiElementHandle> {
        self.resolve(session, spec).await.ok()
    }

    /// All elements of a widget class, in tree order
    ///
    /// Elements whose bounds cannot be read are left out.
    pub async fn locate_all_by_class(
        &self,
        session: &dyn RemoteSession,
        class: &str,
    ) -> Vec<UiElementHandle> {
        let by = By::ClassName(class.to_string());
        let elements = match session.find_elements(&by).await {
            Ok(elements) => elements,
            Err(e) => {
                log::debug!("Class lookup {} failed: {}", class, e);
                return Vec::new();
            }
        };

        let mut handles = Vec::with_capacity(elements.len());
        for element in elements {
            match session.element_rect(&element).await {
                Ok(rect) => handles.push(UiElementHandle::new(
                    class,
                    element,
                    rect,
                    LocatorStrategy::BareId,
                )),
                Err(e) => log::debug!("Skipping {} of class {}: {}", element, class, e),
            }
        }
        handles
    }
}

/// Locator specs for the keys used in one scenario
///
/// A key's spec is fixed the first time it is asked for (or defined), and
/// stays the same for the rest of the scenario.
#[derive(Debug, Clone)]
pub struct LocatorCatalog {
    attribute: String,
    namespace: Option<String>,
    specs: HashMap<String, LocatorSpec>,
}

impl LocatorCatalog {
    pub fn new(attribute: &str, namespace: Option<&str>) -> Self {
        Self {
            attribute: attribute.to_string(),
            namespace: namespace.map(str::to_string),
            specs: HashMap::new(),
        }
    }

    /// Register a custom chain. Returns false if the key is already fixed.
    pub fn define(&mut self, spec: LocatorSpec) -> bool {
        if self.specs.contains_key(spec.key()) {
            return false;
        }
        self.specs.insert(spec.key().to_string(), spec);
        true
    }

    pub fn spec_for(&mut self, key: &str) -> &LocatorSpec {
        let attribute = &self.attribute;
        let namespace = self.namespace.as_deref();
        self.specs
            .entry(key.to_string())
            .or_insert_with(|| LocatorSpec::standard(key, attribute, namespace))
    }
}
