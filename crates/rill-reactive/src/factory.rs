//! PropertyFactory - the single entry point for building properties
//!
//! A factory carries the configuration, the notification lane, and the task
//! registry every property it builds shares. Pass it explicitly to whatever
//! needs to build properties; there is no global instance.
//!
//! ```rust,ignore
//! let factory = PropertyFactory::new()?;
//! let text = factory.create_property(String::from("abc"));
//! let decorated = factory.create_async_calculated_property(
//!     text.clone(),
//!     Some(Duration::from_millis(50)),
//!     |helper, text| async move {
//!         helper.sleep(Duration::from_millis(200)).await?;
//!         Ok::<_, CalculationError>(format!("{text} [CALCULATED]"))
//!     },
//! )?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use rill_core::{
    CalculationError, Dispatcher, InlineDispatcher, NotificationMode, ObservableProperty,
    PropertySource, ReactiveConfig, ReadOnlyProperty, Result, RillError, TaskSpawner,
};
use tokio::runtime::Handle;

use crate::coordinator::{
    AsyncCalculation, Calculation, RoundDriver, RoundOptions, SyncCalculation,
};
use crate::runtime::{SerialDispatcher, TaskRegistry};
use crate::{AsyncCalculationHelper, CalculatedProperty, CalculationContext, SourceSet};

const DEFAULT_NAME: &str = "calculated";

/// Builds observable, read-only, and calculated properties.
///
/// Clones share the notification lane and the task registry.
#[derive(Clone)]
pub struct PropertyFactory {
    config: Arc<ReactiveConfig>,
    tasks: Option<Arc<TaskRegistry>>,
    dispatcher: Arc<dyn Dispatcher>,
    /// Asynchronous properties built here, disposed on shutdown.
    runtime_properties: Arc<Mutex<Vec<Weak<dyn RoundDriver>>>>,
    name: Arc<str>,
}

impl PropertyFactory {
    /// Factory with the default configuration.
    ///
    /// Binds to the calling Tokio runtime if there is one. Without a runtime the
    /// factory still builds observable and synchronous calculated properties.
    pub fn new() -> Result<Self> {
        Self::from_config(ReactiveConfig::default())
    }

    /// Factory built from a validated configuration.
    pub fn from_config(config: ReactiveConfig) -> Result<Self> {
        config.validate()?;
        let tasks = TaskRegistry::current().ok().map(Arc::new);
        Self::build(config, tasks)
    }

    /// Factory that spawns rounds on an explicit runtime.
    pub fn with_handle(config: ReactiveConfig, handle: Handle) -> Result<Self> {
        config.validate()?;
        Self::build(config, Some(Arc::new(TaskRegistry::from_handle(handle))))
    }

    fn build(config: ReactiveConfig, tasks: Option<Arc<TaskRegistry>>) -> Result<Self> {
        let dispatcher: Arc<dyn Dispatcher> = match config.notification {
            NotificationMode::Inline => Arc::new(InlineDispatcher),
            NotificationMode::Serial => {
                let tasks = tasks.as_ref().ok_or_else(|| {
                    RillError::no_runtime("serial notification mode needs a Tokio runtime")
                })?;
                Arc::new(SerialDispatcher::spawn(tasks.handle()))
            }
        };
        tracing::debug!(
            notification = ?config.notification,
            default_debounce_ms = config.default_debounce_ms,
            runtime = tasks.is_some(),
            "property factory created"
        );
        Ok(Self {
            config: Arc::new(config),
            tasks,
            dispatcher,
            runtime_properties: Arc::new(Mutex::new(Vec::new())),
            name: Arc::from(DEFAULT_NAME),
        })
    }

    /// A factory sharing this one's lane and tasks whose calculated
    /// properties carry `name` in their log events.
    pub fn named(&self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            ..self.clone()
        }
    }

    /// A factory sharing this one's tasks but delivering notifications through
    /// `dispatcher`.
    pub fn with_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            ..self.clone()
        }
    }

    /// The configuration this factory was built from.
    pub fn config(&self) -> &ReactiveConfig {
        &self.config
    }

    /// True if asynchronous calculated properties can be built.
    pub fn has_runtime(&self) -> bool {
        self.tasks.is_some()
    }

    /// A mutable observable property.
    pub fn create_property<T>(&self, initial: T) -> ObservableProperty<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        ObservableProperty::with_dispatcher(initial, Arc::clone(&self.dispatcher))
    }

    /// A read-only view over any property.
    pub fn create_read_only_property<S>(&self, source: S) -> ReadOnlyProperty<S::Value>
    where
        S: PropertySource,
    {
        ReadOnlyProperty::new(source)
    }

    /// A property recalculated synchronously on every source change.
    pub fn create_calculated_property<S, T, E, F>(&self, sources: S, f: F) -> CalculatedProperty<T>
    where
        S: SourceSet,
        T: Clone + PartialEq + Default + Send + Sync + 'static,
        E: Into<CalculationError> + 'static,
        F: Fn(S::Snapshot) -> std::result::Result<T, E> + Send + Sync + 'static,
    {
        let calculate: SyncCalculation<S::Snapshot, T> =
            Arc::new(move |snapshot: S::Snapshot| f(snapshot).map_err(Into::<CalculationError>::into));
        CalculatedProperty::launch(
            self.round_options(Duration::ZERO, None),
            sources,
            Calculation::Sync(calculate),
        )
    }

    /// Synchronous calculated property with access to shared context.
    pub fn create_calculated_property_with_context<S, C, T, E, F>(
        &self,
        sources: S,
        context: CalculationContext<C>,
        f: F,
    ) -> CalculatedProperty<T>
    where
        S: SourceSet,
        C: Send + 'static,
        T: Clone + PartialEq + Default + Send + Sync + 'static,
        E: Into<CalculationError> + 'static,
        F: Fn(&CalculationContext<C>, S::Snapshot) -> std::result::Result<T, E>
            + Send
            + Sync
            + 'static,
    {
        self.create_calculated_property(sources, move |snapshot| f(&context, snapshot))
    }

    /// A property recalculated asynchronously with latest-result-wins
    /// publication.
    ///
    /// `debounce` of `None` uses the configured default window. Fails if the
    /// factory has no runtime, was shut down, or the window exceeds the
    /// configured maximum.
    pub fn create_async_calculated_property<S, T, E, F, Fut>(
        &self,
        sources: S,
        debounce: Option<Duration>,
        f: F,
    ) -> Result<CalculatedProperty<T>>
    where
        S: SourceSet,
        T: Clone + PartialEq + Default + Send + Sync + 'static,
        E: Into<CalculationError> + 'static,
        F: Fn(AsyncCalculationHelper, S::Snapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let debounce = self.config.resolve_debounce(debounce)?;
        let spawner = self.spawner()?;
        let calculate: AsyncCalculation<S::Snapshot, T> =
            Arc::new(move |helper: AsyncCalculationHelper, snapshot: S::Snapshot| {
                f(helper, snapshot)
                    .map(|result| result.map_err(Into::<CalculationError>::into))
                    .boxed()
            });
        let property = CalculatedProperty::launch(
            self.round_options(debounce, Some(spawner)),
            sources,
            Calculation::Async(calculate),
        );
        let mut built = self.runtime_properties.lock();
        built.retain(|driver| driver.strong_count() > 0);
        built.push(property.driver());
        Ok(property)
    }

    /// Asynchronous calculated property with access to shared context.
    pub fn create_async_calculated_property_with_context<S, C, T, E, F, Fut>(
        &self,
        sources: S,
        debounce: Option<Duration>,
        context: CalculationContext<C>,
        f: F,
    ) -> Result<CalculatedProperty<T>>
    where
        S: SourceSet,
        C: Send + 'static,
        T: Clone + PartialEq + Default + Send + Sync + 'static,
        E: Into<CalculationError> + 'static,
        F: Fn(AsyncCalculationHelper, CalculationContext<C>, S::Snapshot) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        self.create_async_calculated_property(sources, debounce, move |helper, snapshot| {
            f(helper, context.clone(), snapshot)
        })
    }

    /// Cancel every pending round and debounce timer of every property this
    /// factory (or a clone of it) built, and dispose its asynchronous
    /// calculated properties. Synchronous properties keep working.
    /// Asynchronous creation fails afterwards.
    pub fn shutdown(&self) {
        let Some(tasks) = &self.tasks else {
            return;
        };
        let pending = tasks.pending_tasks();
        tasks.shutdown();
        let built = std::mem::take(&mut *self.runtime_properties.lock());
        let disposed = built
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|driver| !driver.is_disposed())
            .inspect(|driver| driver.dispose())
            .count();
        tracing::info!(factory = %self.name, pending, disposed, "property factory shut down");
    }

    fn spawner(&self) -> Result<Arc<dyn TaskSpawner>> {
        let tasks = self.tasks.as_ref().ok_or_else(|| {
            RillError::no_runtime("asynchronous calculated properties need a Tokio runtime")
        })?;
        if tasks.is_shut_down() {
            return Err(RillError::disposed("property factory has been shut down"));
        }
        let spawner: Arc<dyn TaskSpawner> = tasks.clone();
        Ok(spawner)
    }

    fn round_options(
        &self,
        debounce: Duration,
        spawner: Option<Arc<dyn TaskSpawner>>,
    ) -> RoundOptions {
        RoundOptions {
            name: Arc::clone(&self.name),
            debounce,
            trace_rounds: self.config.trace_rounds,
            spawner,
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl fmt::Debug for PropertyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyFactory")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("runtime", &self.tasks.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_without_runtime_builds_sync_properties() {
        let factory = PropertyFactory::new().unwrap();
        assert!(!factory.has_runtime());

        let input = factory.create_property(2);
        let squared = factory.create_calculated_property(input.clone(), |v: i32| {
            Ok::<_, CalculationError>(v * v)
        });
        input.set(5);
        assert_eq!(squared.get(), 25);

        let err = factory
            .create_async_calculated_property(input, None, |_helper, v: i32| async move {
                Ok::<_, CalculationError>(v)
            })
            .unwrap_err();
        assert!(matches!(err, RillError::NoRuntime { .. }));
    }

    #[test]
    fn test_serial_mode_requires_runtime() {
        let config = ReactiveConfig {
            notification: NotificationMode::Serial,
            ..ReactiveConfig::default()
        };
        assert!(matches!(
            PropertyFactory::from_config(config),
            Err(RillError::NoRuntime { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReactiveConfig {
            default_debounce_ms: 10,
            max_debounce_ms: 5,
            ..ReactiveConfig::default()
        };
        assert!(PropertyFactory::from_config(config).is_err());
    }

    #[tokio::test]
    async fn test_debounce_above_maximum_rejected() {
        let config = ReactiveConfig {
            max_debounce_ms: 100,
            ..ReactiveConfig::default()
        };
        let factory = PropertyFactory::from_config(config).unwrap();
        let input = factory.create_property(0u8);
        let result = factory.create_async_calculated_property(
            input,
            Some(Duration::from_secs(1)),
            |_helper, v: u8| async move { Ok::<_, CalculationError>(v) },
        );
        assert!(matches!(result, Err(RillError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_async_creation() {
        let factory = PropertyFactory::new().unwrap();
        factory.shutdown();
        let input = factory.create_property(0u8);
        let result = factory.create_async_calculated_property(input, None, |_h, v: u8| async move {
            Ok::<_, CalculationError>(v)
        });
        assert!(matches!(result, Err(RillError::Disposed { .. })));
    }

    #[test]
    fn test_sync_context_variant() {
        let factory = PropertyFactory::new().unwrap();
        let calls = CalculationContext::new(0usize);
        let input = factory.create_property(1);
        let counted = factory.create_calculated_property_with_context(
            input.clone(),
            calls.clone(),
            |ctx, v: i32| {
                let n = ctx.with(|calls| {
                    *calls += 1;
                    *calls
                });
                Ok::<_, CalculationError>(format!("{v}#{n}"))
            },
        );
        input.set(7);
        assert_eq!(counted.get(), "7#2");
        assert_eq!(calls.with(|c| *c), 2);
    }

    #[test]
    fn test_named_factory_shares_lane() {
        let factory = PropertyFactory::new().unwrap();
        let named = factory.named("totals");
        assert!(Arc::ptr_eq(&factory.dispatcher, &named.dispatcher));
        assert!(format!("{named:?}").contains("totals"));
    }
}
