//! Request-scoped accumulator of filter contributions and aggregation specs.
//!
//! Features never see each other. Each one tags what it adds with its own
//! [`FeatureId`] and the scope it was applied in; [`Builder::build`] then
//! derives, per aggregation, the filter context made of every contribution
//! except the aggregation owner's own (self-exclusion), with each
//! contribution placed at the nesting level of the scope it was added in.

use super::{
    AggregationKind, AggregationNode, AggregationPlan, BucketOptions, QueryDescription,
    BUCKETS_AGG, GLOBAL_AGG, NESTED_AGG, SCOPED_AGG,
};
use crate::error::{FacetError, Result};
use crate::types::{Filter, InnerHitsRequest};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a feature instance. Used as an ownership tag on contributions
/// and aggregation specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(u64);

impl FeatureId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FeatureId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a scope node in the builder's arena. The root is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Debug)]
struct ScopeNode {
    path: Option<String>,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    inner_hits: bool,
}

/// One primary filter a feature wants applied to the base query.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub owner: FeatureId,
    pub scope: ScopeId,
    pub filter: Filter,
}

/// One named aggregation a feature wants computed.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub owner: FeatureId,
    pub scope: ScopeId,
    pub name: String,
    pub kind: AggregationKind,
    pub options: BucketOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildLimits {
    /// Hits returned per request.
    pub size: u32,
    /// Bucket cap for terms aggregations.
    pub max_values_per_facet: u32,
    /// Sub-documents returned per nested inner-hits request.
    pub inner_hits_size: u32,
}

impl Default for BuildLimits {
    fn default() -> Self {
        BuildLimits {
            size: 20,
            max_values_per_facet: 1000,
            inner_hits_size: 100,
        }
    }
}

#[derive(Debug)]
pub struct Builder {
    limits: BuildLimits,
    scopes: Vec<ScopeNode>,
    stack: Vec<ScopeId>,
    contributions: Vec<Contribution>,
    aggregations: Vec<AggregationSpec>,
    owners: HashMap<String, FeatureId>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new(BuildLimits::default())
    }
}

impl Builder {
    pub fn new(limits: BuildLimits) -> Self {
        Builder {
            limits,
            scopes: vec![ScopeNode {
                path: None,
                parent: None,
                children: Vec::new(),
                inner_hits: false,
            }],
            stack: Vec::new(),
            contributions: Vec::new(),
            aggregations: Vec::new(),
            owners: HashMap::new(),
        }
    }

    pub fn limits(&self) -> &BuildLimits {
        &self.limits
    }

    pub fn current_scope(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId::ROOT)
    }

    /// Nested path of `scope`; `None` for the root.
    pub fn scope_path(&self, scope: ScopeId) -> Option<&str> {
        self.scopes.get(scope.0).and_then(|s| s.path.as_deref())
    }

    /// Push a nested scope for `path` under the current scope. Entering the
    /// same path twice under the same parent reuses the scope.
    ///
    /// The scope is popped when the returned guard is dropped.
    pub fn enter_scope(&mut self, path: &str) -> ScopeGuard<'_> {
        let parent = self.current_scope();
        let existing = self.scopes[parent.0]
            .children
            .iter()
            .copied()
            .find(|c| self.scopes[c.0].path.as_deref() == Some(path));
        let scope = match existing {
            Some(scope) => scope,
            None => {
                let scope = ScopeId(self.scopes.len());
                self.scopes.push(ScopeNode {
                    path: Some(path.to_string()),
                    parent: Some(parent),
                    children: Vec::new(),
                    inner_hits: false,
                });
                self.scopes[parent.0].children.push(scope);
                scope
            }
        };
        self.stack.push(scope);
        ScopeGuard {
            builder: self,
            scope,
        }
    }

    fn exit_scope(&mut self, scope: ScopeId) {
        let popped = self.stack.pop();
        debug_assert_eq!(popped, Some(scope), "scopes must exit in LIFO order");
    }

    pub fn add_filter(&mut self, owner: FeatureId, filter: Filter) {
        if filter.is_match_all() {
            return;
        }
        let scope = self.current_scope();
        self.contributions.push(Contribution {
            owner,
            scope,
            filter,
        });
    }

    /// Register a named aggregation in the current scope.
    ///
    /// # Errors
    ///
    /// [`FacetError::DuplicateAggregation`] if another feature already
    /// registered `name`. The same owner registering again replaces its spec.
    pub fn add_aggregation(
        &mut self,
        owner: FeatureId,
        name: &str,
        kind: AggregationKind,
        options: BucketOptions,
    ) -> Result<()> {
        let scope = self.current_scope();
        match self.owners.get(name) {
            Some(existing) if *existing != owner => {
                return Err(FacetError::DuplicateAggregation {
                    name: name.to_string(),
                })
            }
            Some(_) => {
                self.aggregations.retain(|a| a.name != name);
            }
            None => {
                self.owners.insert(name.to_string(), owner);
            }
        }
        self.aggregations.push(AggregationSpec {
            owner,
            scope,
            name: name.to_string(),
            kind,
            options,
        });
        Ok(())
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    pub fn aggregations(&self) -> &[AggregationSpec] {
        &self.aggregations
    }

    /// Materialize the query: the base query ANDs every contribution, and
    /// every aggregation is wrapped in its self-excluding filter context.
    pub fn build(self) -> QueryDescription {
        let query = self.scoped_filter(ScopeId::ROOT, None, None, true);

        let mut facets = IndexMap::new();
        let mut plans = Vec::with_capacity(self.aggregations.len());
        for spec in &self.aggregations {
            let (node, nested_depth) = self.aggregation_node(spec);
            facets.insert(spec.name.clone(), node);
            plans.push(AggregationPlan {
                name: spec.name.clone(),
                nested_depth,
                options: spec.options,
            });
        }

        let mut aggregations = IndexMap::new();
        if !facets.is_empty() {
            aggregations.insert(
                GLOBAL_AGG.to_string(),
                AggregationNode::Global { aggs: facets },
            );
        }

        tracing::debug!(
            "[BUILD] contributions={} aggregations={} scopes={}",
            self.contributions.len(),
            plans.len(),
            self.scopes.len()
        );

        QueryDescription {
            query,
            size: self.limits.size,
            aggregations,
            plans,
        }
    }

    /// AND of the contributions in `at` and, as nested clauses, in every
    /// child subtree of `at` except `skip_child`. Contributions owned by
    /// `exclude_owner` are left out.
    fn scoped_filter(
        &self,
        at: ScopeId,
        skip_child: Option<ScopeId>,
        exclude_owner: Option<FeatureId>,
        with_inner_hits: bool,
    ) -> Filter {
        let mut parts: Vec<Filter> = self
            .contributions
            .iter()
            .filter(|c| c.scope == at && Some(c.owner) != exclude_owner)
            .map(|c| c.filter.clone())
            .collect();

        for &child in &self.scopes[at.0].children {
            if Some(child) == skip_child {
                continue;
            }
            let inner = self.scoped_filter(child, None, exclude_owner, with_inner_hits);
            if inner.is_match_all() {
                continue;
            }
            let node = &self.scopes[child.0];
            let path = node.path.clone().unwrap_or_default();
            let inner_hits = (with_inner_hits && node.inner_hits).then(|| InnerHitsRequest {
                name: path.clone(),
                size: self.limits.inner_hits_size,
            });
            parts.push(Filter::Nested {
                path,
                query: Box::new(inner),
                inner_hits,
            });
        }

        Filter::and(parts)
    }

    /// Scopes from the root down to `scope`, inclusive.
    fn chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut cursor = scope;
        while let Some(parent) = self.scopes[cursor.0].parent {
            chain.push(parent);
            cursor = parent;
        }
        chain.reverse();
        chain
    }

    fn aggregation_node(&self, spec: &AggregationSpec) -> (AggregationNode, usize) {
        let chain = self.chain(spec.scope);
        let depth = chain.len() - 1;
        let level_filter = |i: usize| {
            self.scoped_filter(chain[i], chain.get(i + 1).copied(), Some(spec.owner), false)
        };

        let mut key = BUCKETS_AGG;
        let mut node = AggregationNode::Bucket(spec.kind.clone());
        for i in (1..=depth).rev() {
            let scoped = AggregationNode::Filter {
                filter: level_filter(i),
                aggs: IndexMap::from([(key.to_string(), node)]),
            };
            node = AggregationNode::Nested {
                path: self.scopes[chain[i].0].path.clone().unwrap_or_default(),
                aggs: IndexMap::from([(SCOPED_AGG.to_string(), scoped)]),
            };
            key = NESTED_AGG;
        }

        let top = AggregationNode::Filter {
            filter: level_filter(0),
            aggs: IndexMap::from([(key.to_string(), node)]),
        };
        (top, depth)
    }
}

/// Keeps a nested scope entered for as long as it lives. Derefs to the
/// [`Builder`], so filters and aggregations added through it are tagged with
/// the scope.
pub struct ScopeGuard<'a> {
    builder: &'a mut Builder,
    scope: ScopeId,
}

impl ScopeGuard<'_> {
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Ask the backend to return the sub-documents of this scope that match
    /// its filters alongside each hit.
    pub fn request_inner_hits(&mut self) {
        self.builder.scopes[self.scope.0].inner_hits = true;
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Builder;

    fn deref(&self) -> &Builder {
        self.builder
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Builder {
        self.builder
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.builder.exit_scope(self.scope);
    }
}
