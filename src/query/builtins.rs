//! Shared bodies for the extension functions every language exposes.
//!
//! The bodies are language-independent (they read the normalized tree and
//! its annotations), so plugins register them with fixed fingerprints:
//! re-registration by a second language is a no-op instead of a conflict.

use std::collections::HashSet;
use std::sync::Arc;

use crate::metrics::{MetricResult, MetricsProvider};
use crate::passes::types::TypeRef;
use crate::query::{
    EvalContext, FunctionDef, FunctionRegistry, Namespace, QueryError, QueryValue,
    RegistrationConflict,
};
use crate::tree::{NodeId, NodeKind};

pub const METRIC: &str = "metric";
pub const COMMENT_ON: &str = "comment-on";
pub const TYPE_OF: &str = "type-of";
pub const TYPE_IS: &str = "type-is";
pub const TYPE_IS_EXACTLY: &str = "type-is-exactly";

/// Register the globally-scoped functions (`metric`, `comment-on`).
pub fn register_shared(registry: &mut FunctionRegistry) -> Result<(), RegistrationConflict> {
    registry.register(FunctionDef {
        namespace: Namespace::Global,
        name: METRIC,
        fingerprint: "core/metric@1",
        body: Arc::new(metric),
    })?;
    registry.register(FunctionDef {
        namespace: Namespace::Global,
        name: COMMENT_ON,
        fingerprint: "core/comment-on@1",
        body: Arc::new(comment_on),
    })?;
    Ok(())
}

/// Register the type predicates under a language namespace.
pub fn register_type_predicates(
    registry: &mut FunctionRegistry,
    language: &'static str,
) -> Result<(), RegistrationConflict> {
    registry.register(FunctionDef {
        namespace: Namespace::Language(language),
        name: TYPE_OF,
        fingerprint: "core/type-of@1",
        body: Arc::new(type_of),
    })?;
    registry.register(FunctionDef {
        namespace: Namespace::Language(language),
        name: TYPE_IS_EXACTLY,
        fingerprint: "core/type-is-exactly@1",
        body: Arc::new(type_is_exactly),
    })?;
    registry.register(FunctionDef {
        namespace: Namespace::Language(language),
        name: TYPE_IS,
        fingerprint: "core/type-is@1",
        body: Arc::new(type_is),
    })?;
    Ok(())
}

/// `metric(name)`: named metric of the subject node, delegating to the
/// language's metrics provider. Not-applicable computations yield `Empty`.
fn metric(
    ctx: &EvalContext<'_>,
    node: NodeId,
    args: &[QueryValue],
) -> Result<QueryValue, QueryError> {
    let name = single_str(METRIC, args)?;
    // A name may exist at both scopes (e.g. NCSS); prefer the key that
    // matches the subject node.
    let candidates = || {
        ctx.metrics
            .type_metrics()
            .iter()
            .chain(ctx.metrics.operation_metrics())
            .filter(|k| k.name == name)
    };
    let key = candidates()
        .find(|k| k.applies_to(ctx.tree, node))
        .or_else(|| candidates().next())
        .copied()
        .ok_or_else(|| QueryError::UnknownMetric {
            name: name.to_string(),
        })?;
    Ok(match ctx.metrics.compute(key, ctx.tree, node) {
        MetricResult::Value(v) => QueryValue::Number(v),
        MetricResult::NotApplicable => QueryValue::Empty,
    })
}

/// `comment-on()`: text of the nearest comment preceding the subject node.
fn comment_on(
    ctx: &EvalContext<'_>,
    node: NodeId,
    _args: &[QueryValue],
) -> Result<QueryValue, QueryError> {
    let target = ctx.tree.span(node);
    let mut best: Option<(usize, usize, NodeId)> = None;
    for candidate in ctx.tree.preorder() {
        if ctx.tree.kind(candidate) != NodeKind::Comment {
            continue;
        }
        let span = ctx.tree.span(candidate);
        let pos = (span.end_line, span.end_col);
        if pos > (target.start_line, target.start_col) {
            continue;
        }
        if best.map(|(l, c, _)| pos > (l, c)).unwrap_or(true) {
            best = Some((pos.0, pos.1, candidate));
        }
    }
    Ok(match best {
        Some((_, _, comment)) => match ctx.tree.name(comment) {
            Some(text) => QueryValue::Str(text.to_string()),
            None => QueryValue::Empty,
        },
        None => QueryValue::Empty,
    })
}

/// `type-of()`: resolved type name of the subject node. Unknown types
/// yield `Empty`; a legitimate void type yields its name.
fn type_of(
    ctx: &EvalContext<'_>,
    node: NodeId,
    _args: &[QueryValue],
) -> Result<QueryValue, QueryError> {
    Ok(match ctx.tree.annotations().type_of(node) {
        Some(TypeRef::Named(name)) => QueryValue::Str(name.clone()),
        Some(TypeRef::Void) => QueryValue::Str("void".to_string()),
        Some(TypeRef::Unknown) | None => QueryValue::Empty,
    })
}

/// `type-is-exactly(name)`: the subject's static type is exactly the named
/// type (qualified or simple form both accepted).
fn type_is_exactly(
    ctx: &EvalContext<'_>,
    node: NodeId,
    args: &[QueryValue],
) -> Result<QueryValue, QueryError> {
    let expected = single_str(TYPE_IS_EXACTLY, args)?;
    let matched = match ctx.tree.annotations().type_of(node) {
        Some(t @ TypeRef::Named(name)) => {
            name == expected || t.simple_name() == Some(expected)
        }
        _ => false,
    };
    Ok(QueryValue::Bool(matched))
}

/// `type-is(name)`: the subject's static type is the named type or a
/// subtype of it. Supertype information comes from the lookup context;
/// without one, this degrades to the exact check.
fn type_is(
    ctx: &EvalContext<'_>,
    node: NodeId,
    args: &[QueryValue],
) -> Result<QueryValue, QueryError> {
    if let QueryValue::Bool(true) = type_is_exactly(ctx, node, args)? {
        return Ok(QueryValue::Bool(true));
    }
    let expected = single_str(TYPE_IS, args)?;
    let Some(TypeRef::Named(name)) = ctx.tree.annotations().type_of(node) else {
        return Ok(QueryValue::Bool(false));
    };
    let Some(lookup) = ctx.lookup else {
        return Ok(QueryValue::Bool(false));
    };

    // Transitive walk over the supertype lists the lookup supplies.
    let mut pending = vec![name.clone()];
    let mut visited = HashSet::new();
    while let Some(current) = pending.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(decl) = lookup.resolve(&current) else {
            continue;
        };
        for supertype in decl.supertypes {
            let simple = supertype.rsplit('.').next().unwrap_or(&supertype);
            if supertype == expected || simple == expected {
                return Ok(QueryValue::Bool(true));
            }
            pending.push(supertype);
        }
    }
    Ok(QueryValue::Bool(false))
}

fn single_str<'v>(
    function: &'static str,
    args: &'v [QueryValue],
) -> Result<&'v str, QueryError> {
    match args {
        [QueryValue::Str(s)] => Ok(s),
        _ => Err(QueryError::BadArgument {
            function,
            expected: "one string argument",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{ExternalDecl, MapLookup};
    use crate::metrics::{MetricKey, MetricsProvider, MetricResult};
    use crate::passes::qualified::QualifiedNamePass;
    use crate::passes::symbols::SymbolPass;
    use crate::passes::types::TypePass;
    use crate::tree::{NodeKind, Span, SyntaxTree, TreeBuilder};

    struct FixedMetrics;

    static OP_KEYS: &[MetricKey] = &[MetricKey::operation_level("CYCLO")];

    impl MetricsProvider for FixedMetrics {
        fn type_metrics(&self) -> &'static [MetricKey] {
            &[]
        }
        fn operation_metrics(&self) -> &'static [MetricKey] {
            OP_KEYS
        }
        fn compute(&self, _key: MetricKey, _tree: &SyntaxTree, _node: NodeId) -> MetricResult {
            MetricResult::Value(7.0)
        }
    }

    fn typed_tree() -> (SyntaxTree, NodeId) {
        let mut b = TreeBuilder::new();
        b.open(NodeKind::CompilationUnit, Span::default());
        let comment = b.leaf(NodeKind::Comment, Span::point(1, 1));
        b.set_name(comment, "// the widget field");
        let field = b.leaf(NodeKind::FieldDecl, Span::point(2, 1));
        b.set_name(field, "widget");
        b.set_type_name(field, "com.example.Widget");
        b.close();
        let mut tree = b.finish();
        SymbolPass::run(&mut tree, None).unwrap();
        QualifiedNamePass::run(&mut tree, None).unwrap();
        TypePass::run(&mut tree, None).unwrap();
        (tree, field)
    }

    fn ctx<'a>(
        tree: &'a SyntaxTree,
        metrics: &'a FixedMetrics,
        lookup: Option<&'a dyn crate::lookup::Lookup>,
    ) -> EvalContext<'a> {
        EvalContext {
            tree,
            source: "",
            metrics,
            lookup,
        }
    }

    #[test]
    fn test_metric_function() {
        let (tree, field) = typed_tree();
        let metrics = FixedMetrics;
        let c = ctx(&tree, &metrics, None);
        let out = metric(&c, field, &[QueryValue::Str("CYCLO".into())]).unwrap();
        assert_eq!(out, QueryValue::Number(7.0));

        let err = metric(&c, field, &[QueryValue::Str("NOPE".into())]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownMetric { .. }));
    }

    #[test]
    fn test_comment_on_finds_nearest_preceding() {
        let (tree, field) = typed_tree();
        let metrics = FixedMetrics;
        let c = ctx(&tree, &metrics, None);
        let out = comment_on(&c, field, &[]).unwrap();
        assert_eq!(out, QueryValue::Str("// the widget field".into()));
    }

    #[test]
    fn test_type_predicates() {
        let (tree, field) = typed_tree();
        let metrics = FixedMetrics;
        let c = ctx(&tree, &metrics, None);

        assert_eq!(type_of(&c, field, &[]).unwrap(), QueryValue::Str("com.example.Widget".into()));
        assert_eq!(
            type_is_exactly(&c, field, &[QueryValue::Str("Widget".into())]).unwrap(),
            QueryValue::Bool(true)
        );
        assert_eq!(
            type_is_exactly(&c, field, &[QueryValue::Str("Gadget".into())]).unwrap(),
            QueryValue::Bool(false)
        );
    }

    #[test]
    fn test_type_is_walks_supertypes_through_lookup() {
        let (tree, field) = typed_tree();
        let metrics = FixedMetrics;
        let mut lookup = MapLookup::new();
        lookup.insert(
            ExternalDecl::new("com.example.Widget")
                .with_supertypes(vec!["com.example.Component".to_string()]),
        );
        lookup.insert(
            ExternalDecl::new("com.example.Component")
                .with_supertypes(vec!["com.example.Base".to_string()]),
        );
        let c = ctx(&tree, &metrics, Some(&lookup));

        for expected in ["Component", "com.example.Base"] {
            assert_eq!(
                type_is(&c, field, &[QueryValue::Str(expected.into())]).unwrap(),
                QueryValue::Bool(true),
                "expected subtype match for {expected}"
            );
        }
        assert_eq!(
            type_is(&c, field, &[QueryValue::Str("Unrelated".into())]).unwrap(),
            QueryValue::Bool(false)
        );

        // Without a lookup it degrades to the exact check.
        let c = ctx(&tree, &metrics, None);
        assert_eq!(
            type_is(&c, field, &[QueryValue::Str("Component".into())]).unwrap(),
            QueryValue::Bool(false)
        );
    }
}
