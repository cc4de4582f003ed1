//! Tree-sitter-backed Java parser and normalizer.

use tree_sitter::{Language, Node};

use crate::lang::treesitter::{first_error, node_text, span_of, truncate};
use crate::lang::{ParseError, SourceParser};
use crate::tree::{
    LiteralKind, NodeId, NodeKind, OperationKind, SyntaxTree, TreeBuilder, TypeDeclKind,
};

pub struct JavaParser {
    language: Language,
}

impl JavaParser {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }
}

impl Default for JavaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for JavaParser {
    fn parse(&mut self, file: &str, source: &str) -> Result<SyntaxTree, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ParseError {
                file: file.to_string(),
                line: 1,
                column: 1,
                message: format!("failed to load Java grammar: {}", e),
            })?;
        let ts_tree = parser.parse(source, None).ok_or_else(|| ParseError {
            file: file.to_string(),
            line: 1,
            column: 1,
            message: "parser produced no tree".to_string(),
        })?;

        if let Some(bad) = first_error(ts_tree.root_node()) {
            let pos = bad.start_position();
            return Err(ParseError {
                file: file.to_string(),
                line: pos.row + 1,
                column: pos.column + 1,
                message: format!("syntax error near `{}`", truncate(node_text(bad, source))),
            });
        }

        let mut normalizer = Normalizer {
            source,
            builder: TreeBuilder::new(),
        };
        let root = ts_tree.root_node();
        normalizer.builder.open(NodeKind::CompilationUnit, span_of(root));
        normalizer.children(root);
        normalizer.builder.close();
        Ok(normalizer.builder.finish())
    }
}

struct Normalizer<'s> {
    source: &'s str,
    builder: TreeBuilder,
}

impl<'s> Normalizer<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        node_text(node, self.source)
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
    }

    /// Normalize all named children of a node.
    fn children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.node(child);
        }
    }

    fn field(&mut self, node: Node<'_>, field: &str) {
        if let Some(child) = node.child_by_field_name(field) {
            self.node(child);
        }
    }

    /// Record modifier keywords and annotation children of a declaration.
    fn modifiers(&mut self, id: NodeId, node: Node<'_>) {
        let mut cursor = node.walk();
        let Some(mods) = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "modifiers")
        else {
            return;
        };
        let mut inner = mods.walk();
        for m in mods.children(&mut inner) {
            match m.kind() {
                "annotation" | "marker_annotation" => {
                    let ann = self.builder.leaf(NodeKind::Annotation, span_of(m));
                    let text = self.text(m).trim_start_matches('@').to_string();
                    self.builder.set_name(ann, text);
                }
                _ => {
                    let text = self.text(m);
                    if !text.is_empty() {
                        self.builder.add_modifier(id, text);
                    }
                }
            }
        }
    }

    fn parameters(&mut self, node: Node<'_>) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        // Lambda shorthand `x -> ...`: the parameter list is a bare
        // identifier.
        if params.kind() == "identifier" {
            let id = self.builder.leaf(NodeKind::Parameter, span_of(params));
            let text = self.text(params).to_string();
            self.builder.set_name(id, text);
            return;
        }
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            match p.kind() {
                "formal_parameter" | "spread_parameter" => {
                    let id = self.builder.open(NodeKind::Parameter, span_of(p));
                    if let Some(name) = self.field_text(p, "name") {
                        self.builder.set_name(id, name);
                    }
                    if let Some(ty) = self.field_text(p, "type") {
                        self.builder.set_type_name(id, ty);
                    }
                    self.builder.close();
                }
                // Lambda shorthand: a bare identifier parameter.
                "identifier" => {
                    let id = self.builder.leaf(NodeKind::Parameter, span_of(p));
                    let text = self.text(p).to_string();
                    self.builder.set_name(id, text);
                }
                _ => {}
            }
        }
    }

    /// One declaration node per declarator in a field/local declaration.
    fn variable_declaration(&mut self, node: Node<'_>, kind: NodeKind) {
        let type_text = self.field_text(node, "type");
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let id = self.builder.open(kind, span_of(declarator));
            if let Some(name) = self.field_text(declarator, "name") {
                self.builder.set_name(id, name);
            }
            if let Some(ref ty) = type_text {
                self.builder.set_type_name(id, ty.clone());
            }
            self.modifiers(id, node);
            self.field(declarator, "value");
            self.builder.close();
        }
    }

    fn type_decl(&mut self, node: Node<'_>, kind: TypeDeclKind) {
        let id = self.builder.open(NodeKind::TypeDecl(kind), span_of(node));
        if let Some(name) = self.field_text(node, "name") {
            self.builder.set_name(id, name);
        }
        self.modifiers(id, node);
        self.type_parameters(node);
        if kind == TypeDeclKind::Record {
            // Record components double as fields.
            if let Some(params) = node.child_by_field_name("parameters") {
                let mut cursor = params.walk();
                for p in params.named_children(&mut cursor) {
                    if p.kind() != "formal_parameter" {
                        continue;
                    }
                    let field = self.builder.open(NodeKind::FieldDecl, span_of(p));
                    if let Some(name) = self.field_text(p, "name") {
                        self.builder.set_name(field, name);
                    }
                    if let Some(ty) = self.field_text(p, "type") {
                        self.builder.set_type_name(field, ty);
                    }
                    self.builder.close();
                }
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.children(body);
        }
        self.builder.close();
    }

    fn type_parameters(&mut self, node: Node<'_>) {
        let Some(params) = node.child_by_field_name("type_parameters") else {
            return;
        };
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            if p.kind() == "type_parameter" {
                let id = self.builder.leaf(NodeKind::TypeParameter, span_of(p));
                let mut inner = p.walk();
                let found = p
                    .named_children(&mut inner)
                    .find(|c| c.kind() == "type_identifier");
                if let Some(name) = found {
                    let text = self.text(name).to_string();
                    self.builder.set_name(id, text);
                }
            }
        }
    }

    fn operation(&mut self, node: Node<'_>, kind: OperationKind) {
        let id = self.builder.open(NodeKind::Operation(kind), span_of(node));
        if let Some(name) = self.field_text(node, "name") {
            self.builder.set_name(id, name);
        }
        if let Some(ty) = self.field_text(node, "type") {
            self.builder.set_type_name(id, ty);
        }
        self.modifiers(id, node);
        self.parameters(node);
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "block" || body.kind() == "constructor_body" {
                self.block(body);
            } else {
                // Expression-bodied lambda.
                self.node(body);
            }
        }
        self.builder.close();
    }

    fn block(&mut self, node: Node<'_>) {
        self.builder.open(NodeKind::Block, span_of(node));
        self.children(node);
        self.builder.close();
    }

    fn node(&mut self, node: Node<'_>) {
        let span = span_of(node);
        match node.kind() {
            "package_declaration" => {
                let id = self.builder.leaf(NodeKind::PackageDecl, span);
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"));
                if let Some(name) = found {
                    let text = self.text(name).to_string();
                    self.builder.set_name(id, text);
                }
            }
            "import_declaration" => {
                let id = self.builder.leaf(NodeKind::ImportDecl, span);
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"));
                if let Some(name) = found {
                    let text = self.text(name).to_string();
                    self.builder.set_name(id, text);
                }
            }
            "class_declaration" => self.type_decl(node, TypeDeclKind::Class),
            "interface_declaration" => self.type_decl(node, TypeDeclKind::Interface),
            "enum_declaration" => self.type_decl(node, TypeDeclKind::Enum),
            "record_declaration" => self.type_decl(node, TypeDeclKind::Record),
            "method_declaration" => self.operation(node, OperationKind::Method),
            "constructor_declaration" => self.operation(node, OperationKind::Constructor),
            "lambda_expression" => self.operation(node, OperationKind::Lambda),
            "field_declaration" => self.variable_declaration(node, NodeKind::FieldDecl),
            "local_variable_declaration" => {
                self.variable_declaration(node, NodeKind::LocalVarDecl)
            }
            "block" => self.block(node),
            "if_statement" => {
                self.builder.open(NodeKind::IfStmt, span);
                self.field(node, "condition");
                self.field(node, "consequence");
                self.field(node, "alternative");
                self.builder.close();
            }
            "while_statement" | "do_statement" => {
                self.builder.open(NodeKind::LoopStmt, span);
                self.field(node, "condition");
                self.field(node, "body");
                self.builder.close();
            }
            "for_statement" => {
                self.builder.open(NodeKind::LoopStmt, span);
                self.field(node, "init");
                self.field(node, "condition");
                self.field(node, "update");
                self.field(node, "body");
                self.builder.close();
            }
            "enhanced_for_statement" => {
                self.builder.open(NodeKind::LoopStmt, span);
                let var = self.builder.open(NodeKind::LocalVarDecl, span);
                if let Some(name) = self.field_text(node, "name") {
                    self.builder.set_name(var, name);
                }
                if let Some(ty) = self.field_text(node, "type") {
                    self.builder.set_type_name(var, ty);
                }
                self.field(node, "value");
                self.builder.close();
                self.field(node, "body");
                self.builder.close();
            }
            "switch_expression" => {
                let statement_position = node
                    .parent()
                    .map(|p| {
                        matches!(
                            p.kind(),
                            "block" | "program" | "switch_block_statement_group" | "labeled_statement"
                        )
                    })
                    .unwrap_or(true);
                let arrow_form = node
                    .child_by_field_name("body")
                    .map(|b| {
                        let mut cursor = b.walk();
                        let has_rule =
                            b.named_children(&mut cursor).any(|c| c.kind() == "switch_rule");
                        has_rule
                    })
                    .unwrap_or(false);
                let kind = if statement_position && !arrow_form {
                    NodeKind::SwitchStmt
                } else {
                    NodeKind::SwitchExpr
                };
                self.builder.open(kind, span);
                self.field(node, "condition");
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for group in body.named_children(&mut cursor) {
                        match group.kind() {
                            "switch_block_statement_group" | "switch_rule" => {
                                self.builder.open(NodeKind::CaseClause, span_of(group));
                                self.children(group);
                                self.builder.close();
                            }
                            _ => self.node(group),
                        }
                    }
                }
                self.builder.close();
            }
            "return_statement" => {
                self.builder.open(NodeKind::ReturnStmt, span);
                self.children(node);
                self.builder.close();
            }
            "throw_statement" => {
                self.builder.open(NodeKind::ThrowStmt, span);
                self.children(node);
                self.builder.close();
            }
            "break_statement" => {
                self.builder.leaf(NodeKind::BreakStmt, span);
            }
            "continue_statement" => {
                self.builder.leaf(NodeKind::ContinueStmt, span);
            }
            "expression_statement" => {
                self.builder.open(NodeKind::ExprStmt, span);
                self.children(node);
                self.builder.close();
            }
            "try_statement" | "try_with_resources_statement" => {
                self.builder.open(NodeKind::TryStmt, span);
                if let Some(resources) = node.child_by_field_name("resources") {
                    self.builder
                        .leaf(NodeKind::Other("resource_specification"), span_of(resources));
                }
                self.field(node, "body");
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "catch_clause" => self.catch_clause(child),
                        "finally_clause" => {
                            let mut inner = child.walk();
                            let block_child =
                                child.named_children(&mut inner).find(|c| c.kind() == "block");
                            if let Some(block) = block_child {
                                self.block(block);
                            }
                        }
                        _ => {}
                    }
                }
                self.builder.close();
            }
            "assignment_expression" => {
                self.builder.open(NodeKind::Assignment, span);
                self.field(node, "left");
                self.field(node, "right");
                self.builder.close();
            }
            "binary_expression" => {
                let id = self.builder.open(NodeKind::BinaryExpr, span);
                if let Some(op) = self.field_text(node, "operator") {
                    if matches!(op.as_str(), "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||")
                    {
                        self.builder.set_type_name(id, "boolean");
                    }
                    self.builder.set_name(id, op);
                }
                self.field(node, "left");
                self.field(node, "right");
                self.builder.close();
            }
            "unary_expression" | "update_expression" => {
                let id = self.builder.open(NodeKind::UnaryExpr, span);
                if let Some(op) = self.field_text(node, "operator") {
                    if op == "!" {
                        self.builder.set_type_name(id, "boolean");
                    }
                    self.builder.set_name(id, op);
                }
                self.children(node);
                self.builder.close();
            }
            "ternary_expression" => {
                self.builder.open(NodeKind::TernaryExpr, span);
                self.field(node, "condition");
                self.field(node, "consequence");
                self.field(node, "alternative");
                self.builder.close();
            }
            "instanceof_expression" => {
                let id = self.builder.open(NodeKind::InstanceOfExpr, span);
                self.builder.set_type_name(id, "boolean");
                if let Some(binding) = node.child_by_field_name("name") {
                    let text = self.text(binding).to_string();
                    self.builder.set_name(id, text);
                }
                self.field(node, "left");
                self.builder.close();
            }
            "method_invocation" => {
                let id = self.builder.open(NodeKind::CallExpr, span);
                if let Some(name) = self.field_text(node, "name") {
                    self.builder.set_name(id, name);
                }
                self.field(node, "object");
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.children(args);
                }
                self.builder.close();
            }
            "object_creation_expression" => {
                let id = self.builder.open(NodeKind::CallExpr, span);
                if let Some(ty) = self.field_text(node, "type") {
                    self.builder.set_type_name(id, ty);
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.children(args);
                }
                self.builder.close();
            }
            "field_access" => {
                let id = self.builder.open(NodeKind::FieldAccess, span);
                if let Some(name) = self.field_text(node, "field") {
                    self.builder.set_name(id, name);
                }
                self.field(node, "object");
                self.builder.close();
            }
            "parenthesized_expression" => {
                // Transparent: normalize the inner expression in place.
                self.children(node);
            }
            "identifier" => {
                let id = self.builder.leaf(NodeKind::Identifier, span);
                let text = self.text(node).to_string();
                self.builder.set_name(id, text);
            }
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Int), span);
                self.builder.set_type_name(id, "int");
            }
            "decimal_floating_point_literal" | "hex_floating_point_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Float), span);
                self.builder.set_type_name(id, "double");
            }
            "string_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Str), span);
                self.builder.set_type_name(id, "String");
            }
            "text_block" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::TextBlock), span);
                self.builder.set_type_name(id, "String");
            }
            "character_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Char), span);
                self.builder.set_type_name(id, "char");
            }
            "true" | "false" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Bool), span);
                self.builder.set_type_name(id, "boolean");
            }
            "null_literal" => {
                self.builder.leaf(NodeKind::Literal(LiteralKind::Null), span);
            }
            "line_comment" | "block_comment" => {
                let id = self.builder.leaf(NodeKind::Comment, span);
                let text = self.text(node).to_string();
                self.builder.set_name(id, text);
            }
            other => {
                if node.named_child_count() == 0 {
                    self.builder.leaf(NodeKind::Other(other), span);
                } else {
                    self.builder.open(NodeKind::Other(other), span);
                    self.children(node);
                    self.builder.close();
                }
            }
        }
    }

    fn catch_clause(&mut self, node: Node<'_>) {
        let id = self.builder.open(NodeKind::CatchClause, span_of(node));
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "catch_formal_parameter" => {
                    let mut inner = child.walk();
                    for part in child.named_children(&mut inner) {
                        match part.kind() {
                            "identifier" => {
                                let text = self.text(part).to_string();
                                self.builder.set_name(id, text);
                            }
                            "catch_type" => {
                                let text = self.text(part).to_string();
                                self.builder.set_type_name(id, text);
                            }
                            _ => {}
                        }
                    }
                }
                "block" => self.block(child),
                _ => {}
            }
        }
        self.builder.close();
    }
}
