//! 플러그인 레지스트리 -- 역할 + kind 이름 -> 생성자
//!
//! watcher는 구체적인 플러그인 타입을 직접 지정하지 않습니다.
//! [`WatcherBuilder::from_config`]가 watcher 정의의 각 `kind` 문자열을
//! [`PluginRegistry`]로 해석하며, 모든 내장 플러그인은
//! [`PluginRegistry::with_builtins`]가 등록합니다.
//!
//! # 사용 예시
//! ```ignore
//! let mut registry = PluginRegistry::with_builtins();
//! registry.register_consumer("http", HttpConsumer::create)?;
//!
//! let ctx = WatcherContext::new("ssh", false);
//! let tail = registry.producer("TAIL", &ctx, &params)?;
//! ```
//!
//! [`WatcherBuilder::from_config`]: crate::watcher::WatcherBuilder::from_config

use std::collections::BTreeMap;

use logwatch_core::context::WatcherContext;
use logwatch_core::error::{PluginError, PluginRole};
use logwatch_core::plugin::{Conditioner, Consumer, Filter, PluginParams, Producer};

use crate::{conditioners, consumers, filters, producers};

/// 파라미터로 producer를 생성합니다.
pub type ProducerFactory =
    fn(&WatcherContext, &PluginParams) -> Result<Box<dyn Producer>, PluginError>;
/// 파라미터로 filter를 생성합니다.
pub type FilterFactory = fn(&WatcherContext, &PluginParams) -> Result<Box<dyn Filter>, PluginError>;
/// 파라미터로 conditioner를 생성합니다.
pub type ConditionerFactory =
    fn(&WatcherContext, &PluginParams) -> Result<Box<dyn Conditioner>, PluginError>;
/// 파라미터로 consumer를 생성합니다.
pub type ConsumerFactory =
    fn(&WatcherContext, &PluginParams) -> Result<Box<dyn Consumer>, PluginError>;

#[derive(Clone, Copy)]
enum Factory {
    Producer(ProducerFactory),
    Filter(FilterFactory),
    Conditioner(ConditionerFactory),
    Consumer(ConsumerFactory),
}

impl Factory {
    fn role(&self) -> PluginRole {
        match self {
            Self::Producer(_) => PluginRole::Producer,
            Self::Filter(_) => PluginRole::Filter,
            Self::Conditioner(_) => PluginRole::Conditioner,
            Self::Consumer(_) => PluginRole::Consumer,
        }
    }
}

/// `(role, kind)` -> 플러그인 생성자 맵. kind 이름은 대소문자를 구분하지 않습니다.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    factories: BTreeMap<(PluginRole, String), Factory>,
}

impl PluginRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 내장 플러그인을 담은 레지스트리를 생성합니다.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins = [
            ("tail", Factory::Producer(producers::tail::create)),
            ("read", Factory::Producer(producers::read::create)),
            ("grep", Factory::Filter(filters::grep::create)),
            ("awk", Factory::Filter(filters::awk::create)),
            ("sed", Factory::Conditioner(conditioners::sed::create)),
            ("write", Factory::Consumer(consumers::write::create)),
            ("syslog", Factory::Consumer(consumers::syslog::create)),
            ("mail", Factory::Consumer(consumers::mail::create)),
        ];
        for (kind, factory) in builtins {
            registry
                .factories
                .insert((factory.role(), kind.to_owned()), factory);
        }
        registry
    }

    fn insert(&mut self, kind: &str, factory: Factory) -> Result<(), PluginError> {
        let key = (factory.role(), kind.to_ascii_lowercase());
        if self.factories.contains_key(&key) {
            return Err(PluginError::AlreadyRegistered {
                role: key.0,
                kind: key.1,
            });
        }
        self.factories.insert(key, factory);
        Ok(())
    }

    fn lookup(&self, role: PluginRole, kind: &str) -> Result<Factory, PluginError> {
        self.factories
            .get(&(role, kind.to_ascii_lowercase()))
            .copied()
            .ok_or_else(|| PluginError::Unknown {
                role,
                kind: kind.to_owned(),
            })
    }

    pub fn register_producer(
        &mut self,
        kind: &str,
        factory: ProducerFactory,
    ) -> Result<(), PluginError> {
        self.insert(kind, Factory::Producer(factory))
    }

    pub fn register_filter(&mut self, kind: &str, factory: FilterFactory) -> Result<(), PluginError> {
        self.insert(kind, Factory::Filter(factory))
    }

    pub fn register_conditioner(
        &mut self,
        kind: &str,
        factory: ConditionerFactory,
    ) -> Result<(), PluginError> {
        self.insert(kind, Factory::Conditioner(factory))
    }

    pub fn register_consumer(
        &mut self,
        kind: &str,
        factory: ConsumerFactory,
    ) -> Result<(), PluginError> {
        self.insert(kind, Factory::Consumer(factory))
    }

    /// `kind`로 등록된 producer를 생성합니다.
    pub fn producer(
        &self,
        kind: &str,
        ctx: &WatcherContext,
        params: &PluginParams,
    ) -> Result<Box<dyn Producer>, PluginError> {
        match self.lookup(PluginRole::Producer, kind)? {
            Factory::Producer(create) => create(ctx, params),
            _ => unreachable!("factory stored under producer role"),
        }
    }

    /// `kind`로 등록된 filter를 생성합니다.
    pub fn filter(
        &self,
        kind: &str,
        ctx: &WatcherContext,
        params: &PluginParams,
    ) -> Result<Box<dyn Filter>, PluginError> {
        match self.lookup(PluginRole::Filter, kind)? {
            Factory::Filter(create) => create(ctx, params),
            _ => unreachable!("factory stored under filter role"),
        }
    }

    /// `kind`로 등록된 conditioner를 생성합니다.
    pub fn conditioner(
        &self,
        kind: &str,
        ctx: &WatcherContext,
        params: &PluginParams,
    ) -> Result<Box<dyn Conditioner>, PluginError> {
        match self.lookup(PluginRole::Conditioner, kind)? {
            Factory::Conditioner(create) => create(ctx, params),
            _ => unreachable!("factory stored under conditioner role"),
        }
    }

    /// `kind`로 등록된 consumer를 생성합니다.
    pub fn consumer(
        &self,
        kind: &str,
        ctx: &WatcherContext,
        params: &PluginParams,
    ) -> Result<Box<dyn Consumer>, PluginError> {
        match self.lookup(PluginRole::Consumer, kind)? {
            Factory::Consumer(create) => create(ctx, params),
            _ => unreachable!("factory stored under consumer role"),
        }
    }

    /// `role`에 등록된 kind 이름 목록 (정렬됨)
    pub fn kinds(&self, role: PluginRole) -> Vec<&str> {
        self.factories
            .keys()
            .filter(|(r, _)| *r == role)
            .map(|(_, kind)| kind.as_str())
            .collect()
    }

    /// 전체 역할에 걸쳐 등록된 플러그인 수
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.factories.keys().map(|(role, kind)| format!("{role}:{kind}")))
            .finish()
    }
}
