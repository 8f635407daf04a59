//! Effect container
//!
//! Holds the live effect instances of one owner, advances their clocks and
//! reports expirations and period ticks back to whoever subscribed to them.
//!
//! Callbacks are returned from [`EffectContainer::tick`] instead of being
//! invoked from inside it; the owning component dispatches them immediately,
//! within the same update pass, so subscribers still observe them
//! synchronously.

use bevy::prelude::*;
use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;

use super::context::EffectContext;
use super::definition::EffectDefinition;
use crate::attributes::{Attribute, AttributeScope, AttributeSets};
use crate::labels::{Label, LabelSet};

/// Tolerance for comparing accumulated frame time against period/end times.
const TIME_EPSILON: f32 = 1e-4;

/// Opaque reference to an effect instance. May outlive the instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct EffectHandle(u64);

impl EffectHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The two callback kinds an effect instance reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectEvent {
    /// Duration elapsed. Fires once; explicit removal does not fire it.
    Expired,
    /// One period interval passed while the effect was active.
    Period,
}

/// Which ability routine a subscription is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectBinding {
    ActivationFinished,
    ActivationPeriod,
    CooldownEnded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectSubscription {
    /// Ability that wants the callback
    pub subscriber: Label,
    pub binding: EffectBinding,
}

/// A callback produced by [`EffectContainer::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectCallback {
    pub handle: EffectHandle,
    pub event: EffectEvent,
    pub subscriber: Label,
    pub binding: EffectBinding,
}

/// What effects write into when they apply, tick and end.
pub struct EffectTarget<'a> {
    pub attributes: &'a mut AttributeSets,
    pub labels: &'a mut LabelSet,
}

#[derive(Debug)]
struct ActiveEffect {
    handle: EffectHandle,
    spec: Arc<EffectDefinition>,
    context: EffectContext,
    scope: AttributeScope,
    start_time: f32,
    next_period: f32,
    /// Bonus-layer deltas to take back when the effect ends
    applied_bonus: Vec<(Attribute, f32)>,
    on_expired: SmallVec<[EffectSubscription; 1]>,
    on_period: SmallVec<[EffectSubscription; 1]>,
}

impl ActiveEffect {
    fn duration(&self) -> f32 {
        self.spec.duration.max(0.0)
    }

    fn end_time(&self) -> Option<f32> {
        (self.spec.duration > 0.0).then(|| self.start_time + self.spec.duration)
    }
}

/// Effect instances for a single owner.
#[derive(Debug, Default)]
pub struct EffectContainer {
    now: f32,
    next_id: u64,
    active: Vec<ActiveEffect>,
}

impl EffectContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container clock in seconds.
    pub fn now(&self) -> f32 {
        self.now
    }

    /// Apply `spec` on behalf of `context`.
    ///
    /// Instant effects (no duration, no period) change base values right away
    /// and are never active; the returned handle is still unique.
    pub fn apply(
        &mut self,
        spec: &Arc<EffectDefinition>,
        context: &EffectContext,
        scope: AttributeScope,
        target: EffectTarget<'_>,
    ) -> EffectHandle {
        self.next_id += 1;
        let handle = EffectHandle(self.next_id);

        if !spec.is_timed() {
            apply_to_base(spec, scope, target.attributes);
            debug!("Applied instant effect '{}' ({:?})", spec.name, handle);
            return handle;
        }

        let mut applied_bonus = Vec::new();
        if !spec.is_periodic() {
            let attributes = target.attributes.get_mut(scope);
            for modifier in spec.modifiers.iter() {
                let magnitude = modifier.magnitude.resolve(attributes);
                let delta = modifier
                    .op
                    .delta(attributes.current_value(modifier.attribute), magnitude);
                attributes.add_bonus(modifier.attribute, delta);
                applied_bonus.push((modifier.attribute, delta));
            }
        }
        target.labels.add_labels(&spec.granted_labels);

        self.active.push(ActiveEffect {
            handle,
            spec: spec.clone(),
            context: context.clone(),
            scope,
            start_time: self.now,
            next_period: self.now + spec.period,
            applied_bonus,
            on_expired: SmallVec::new(),
            on_period: SmallVec::new(),
        });
        debug!(
            "Applied effect '{}' ({:?}) duration {:.2}s period {:.2}s",
            spec.name, handle, spec.duration, spec.period
        );
        handle
    }

    /// Remove an instance without firing its expired callbacks.
    ///
    /// Returns false if the handle no longer refers to a live instance.
    pub fn remove(&mut self, handle: EffectHandle, target: EffectTarget<'_>) -> bool {
        let Some(index) = self.active.iter().position(|e| e.handle == handle) else {
            return false;
        };
        let effect = self.active.remove(index);
        end_effect(&effect, target);
        debug!("Removed effect '{}' ({:?})", effect.spec.name, handle);
        true
    }

    /// Remove every instance of the named definition applied from the same
    /// ability as `context`. Returns how many were removed.
    pub fn remove_matching(
        &mut self,
        definition: &str,
        context: &EffectContext,
        target: EffectTarget<'_>,
    ) -> usize {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|e| e.spec.name == definition && e.context.ability == context.ability);
        self.active = kept;
        for effect in removed.iter() {
            end_effect(
                effect,
                EffectTarget {
                    attributes: &mut *target.attributes,
                    labels: &mut *target.labels,
                },
            );
        }
        removed.len()
    }

    pub fn is_active(&self, handle: EffectHandle) -> bool {
        self.active.iter().any(|e| e.handle == handle)
    }

    /// Subscribe to the instance's expiration. Returns false for dead handles.
    pub fn subscribe_expired(&mut self, handle: EffectHandle, subscription: EffectSubscription) -> bool {
        match self.find_mut(handle) {
            Some(effect) => {
                effect.on_expired.push(subscription);
                true
            }
            None => false,
        }
    }

    /// Subscribe to the instance's period ticks. Returns false for dead handles.
    pub fn subscribe_period(&mut self, handle: EffectHandle, subscription: EffectSubscription) -> bool {
        match self.find_mut(handle) {
            Some(effect) => {
                effect.on_period.push(subscription);
                true
            }
            None => false,
        }
    }

    /// Advance the clock by `dt`, fire period ticks, expire finished instances.
    ///
    /// Period ticks that land exactly on the expiration time are not fired.
    pub fn tick(&mut self, dt: f32, target: EffectTarget<'_>) -> Vec<EffectCallback> {
        self.now += dt;
        let now = self.now;
        let mut callbacks = Vec::new();

        for effect in self.active.iter_mut() {
            if effect.spec.is_periodic() {
                let end = effect.end_time();
                while effect.next_period <= now + TIME_EPSILON
                    && end.map_or(true, |end| effect.next_period < end - TIME_EPSILON)
                {
                    apply_to_base(&effect.spec, effect.scope, &mut *target.attributes);
                    callbacks.extend(effect.on_period.iter().map(|s| EffectCallback {
                        handle: effect.handle,
                        event: EffectEvent::Period,
                        subscriber: s.subscriber,
                        binding: s.binding,
                    }));
                    effect.next_period += effect.spec.period;
                }
            }
        }

        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|e| e.end_time().is_some_and(|end| now + TIME_EPSILON >= end));
        self.active = kept;

        for effect in expired.iter() {
            end_effect(
                effect,
                EffectTarget {
                    attributes: &mut *target.attributes,
                    labels: &mut *target.labels,
                },
            );
            debug!("Effect '{}' ({:?}) expired", effect.spec.name, effect.handle);
            callbacks.extend(effect.on_expired.iter().map(|s| EffectCallback {
                handle: effect.handle,
                event: EffectEvent::Expired,
                subscriber: s.subscriber,
                binding: s.binding,
            }));
        }

        callbacks
    }

    /// Seconds left. 0 for dead handles and effects without a duration.
    pub fn remaining_time(&self, handle: EffectHandle) -> f32 {
        self.find(handle)
            .and_then(|e| e.end_time())
            .map(|end| (end - self.now).max(0.0))
            .unwrap_or(0.0)
    }

    pub fn remaining_time_normalized(&self, handle: EffectHandle) -> f32 {
        match self.find(handle) {
            Some(effect) if effect.duration() > 0.0 => {
                (self.remaining_time(handle) / effect.duration()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Seconds since the instance was applied. 0 for dead handles.
    pub fn current_time(&self, handle: EffectHandle) -> f32 {
        self.find(handle)
            .map(|e| {
                let elapsed = self.now - e.start_time;
                match e.end_time() {
                    Some(_) => elapsed.min(e.duration()),
                    None => elapsed,
                }
            })
            .unwrap_or(0.0)
    }

    pub fn current_time_normalized(&self, handle: EffectHandle) -> f32 {
        match self.find(handle) {
            Some(effect) if effect.duration() > 0.0 => {
                (self.current_time(handle) / effect.duration()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Container time at which the instance expires. 0 for dead handles and
    /// effects without a duration.
    pub fn end_time(&self, handle: EffectHandle) -> f32 {
        self.find(handle).and_then(|e| e.end_time()).unwrap_or(0.0)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn find(&self, handle: EffectHandle) -> Option<&ActiveEffect> {
        self.active.iter().find(|e| e.handle == handle)
    }

    fn find_mut(&mut self, handle: EffectHandle) -> Option<&mut ActiveEffect> {
        self.active.iter_mut().find(|e| e.handle == handle)
    }
}

fn apply_to_base(spec: &EffectDefinition, scope: AttributeScope, attributes: &mut AttributeSets) {
    let attributes = attributes.get_mut(scope);
    for modifier in spec.modifiers.iter() {
        let magnitude = modifier.magnitude.resolve(attributes);
        let delta = modifier
            .op
            .delta(attributes.current_value(modifier.attribute), magnitude);
        attributes.add_base(modifier.attribute, delta);
    }
}

fn end_effect(effect: &ActiveEffect, target: EffectTarget<'_>) {
    let attributes = target.attributes.get_mut(effect.scope);
    for (attribute, delta) in effect.applied_bonus.iter() {
        attributes.add_bonus(*attribute, -delta);
    }
    target.labels.remove_labels(&effect.spec.granted_labels);
}
