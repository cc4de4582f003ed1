//! Tree-sitter-backed Go parser and normalizer.

use tree_sitter::{Language, Node};

use crate::lang::treesitter::{first_error, node_text, span_of, truncate};
use crate::lang::{ParseError, SourceParser};
use crate::tree::{
    LiteralKind, NodeKind, OperationKind, SyntaxTree, TreeBuilder, TypeDeclKind,
};

pub struct GoParser {
    language: Language,
}

impl GoParser {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
        }
    }
}

impl Default for GoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for GoParser {
    fn parse(&mut self, file: &str, source: &str) -> Result<SyntaxTree, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&self.language).map_err(|e| ParseError {
            file: file.to_string(),
            line: 1,
            column: 1,
            message: format!("failed to load Go grammar: {}", e),
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

    fn block(&mut self, node: Node<'_>) {
        self.builder.open(NodeKind::Block, span_of(node));
        self.children(node);
        self.builder.close();
    }

    fn parameters(&mut self, list: Node<'_>) {
        let mut cursor = list.walk();
        for p in list.named_children(&mut cursor) {
            if !matches!(
                p.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            ) {
                continue;
            }
            let ty = self.field_text(p, "type");
            // `a, b int` declares one parameter per name.
            let mut inner = p.walk();
            let mut named_any = false;
            for name_node in p.named_children(&mut inner) {
                if name_node.kind() != "identifier" {
                    continue;
                }
                named_any = true;
                let id = self.builder.leaf(NodeKind::Parameter, span_of(name_node));
                let text = self.text(name_node).to_string();
                self.builder.set_name(id, text);
                if let Some(ref ty) = ty {
                    self.builder.set_type_name(id, ty.clone());
                }
            }
            if !named_any {
                // Unnamed parameter (interface-style signature).
                let id = self.builder.leaf(NodeKind::Parameter, span_of(p));
                if let Some(ty) = ty {
                    self.builder.set_type_name(id, ty);
                }
            }
        }
    }

    fn type_parameters(&mut self, node: Node<'_>) {
        let Some(list) = node.child_by_field_name("type_parameters") else {
            return;
        };
        let mut cursor = list.walk();
        for p in list.named_children(&mut cursor) {
            if p.kind() != "parameter_declaration" && p.kind() != "type_parameter_declaration" {
                continue;
            }
            let id = self.builder.leaf(NodeKind::TypeParameter, span_of(p));
            let mut inner = p.walk();
            let found = p
                .named_children(&mut inner)
                .find(|c| c.kind() == "identifier");
            if let Some(name) = found {
                let text = self.text(name).to_string();
                self.builder.set_name(id, text);
            }
        }
    }

    fn operation(&mut self, node: Node<'_>, kind: OperationKind) {
        let id = self.builder.open(NodeKind::Operation(kind), span_of(node));
        if let Some(name) = self.field_text(node, "name") {
            self.builder.set_name(id, name);
        }
        if let Some(result) = self.field_text(node, "result") {
            self.builder.set_type_name(id, result);
        }
        if let Some(receiver) = node.child_by_field_name("receiver") {
            self.parameters(receiver);
        }
        self.type_parameters(node);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.parameters(params);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.block(body);
        }
        self.builder.close();
    }

    fn var_names(&mut self, node: Node<'_>, ty: Option<String>, value: Option<Node<'_>>) {
        // One declaration node per declared name; the initializer hangs off
        // the first so flow analysis sees the definition.
        let mut first = true;
        let mut cursor = node.walk();
        for name_node in node.named_children(&mut cursor) {
            if name_node.kind() != "identifier" {
                continue;
            }
            let id = self.builder.open(NodeKind::LocalVarDecl, span_of(name_node));
            let text = self.text(name_node).to_string();
            self.builder.set_name(id, text);
            if let Some(ref ty) = ty {
                self.builder.set_type_name(id, ty.clone());
            }
            if first {
                if let Some(value) = value {
                    self.node(value);
                }
                first = false;
            }
            self.builder.close();
        }
    }

    fn node(&mut self, node: Node<'_>) {
        let span = span_of(node);
        match node.kind() {
            "package_clause" => {
                let id = self.builder.leaf(NodeKind::PackageDecl, span);
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "package_identifier");
                if let Some(name) = found {
                    let text = self.text(name).to_string();
                    self.builder.set_name(id, text);
                }
            }
            "import_declaration" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "import_spec" => self.import_spec(child),
                        "import_spec_list" => {
                            let mut inner = child.walk();
                            for spec in child.named_children(&mut inner) {
                                if spec.kind() == "import_spec" {
                                    self.import_spec(spec);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            "function_declaration" => self.operation(node, OperationKind::Function),
            "method_declaration" => self.operation(node, OperationKind::Method),
            "func_literal" => self.operation(node, OperationKind::Lambda),
            "type_declaration" => {
                let mut cursor = node.walk();
                for spec in node.named_children(&mut cursor) {
                    if spec.kind() == "type_spec" {
                        self.type_spec(spec);
                    }
                }
            }
            "block" => self.block(node),
            "if_statement" => {
                // `if x := f(); cond {}`: surface the initializer as a
                // preceding statement so flow order matches execution.
                if let Some(init) = node.child_by_field_name("initializer") {
                    self.node(init);
                }
                self.builder.open(NodeKind::IfStmt, span);
                self.field(node, "condition");
                self.field(node, "consequence");
                self.field(node, "alternative");
                self.builder.close();
            }
            "for_statement" => {
                self.builder.open(NodeKind::LoopStmt, span);
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "range_clause" => {
                            let value = child.child_by_field_name("right");
                            if let Some(left) = child.child_by_field_name("left") {
                                self.var_names(left, None, value);
                            } else if let Some(value) = value {
                                self.node(value);
                            }
                        }
                        // Transparent: init/condition/update become direct
                        // children of the loop.
                        "for_clause" => self.children(child),
                        "block" => {}
                        _ => self.node(child),
                    }
                }
                self.field(node, "body");
                self.builder.close();
            }
            "expression_switch_statement" | "type_switch_statement" | "select_statement" => {
                self.builder.open(NodeKind::SwitchStmt, span);
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "expression_case" | "default_case" | "type_case" | "communication_case" => {
                            self.builder.open(NodeKind::CaseClause, span_of(child));
                            self.children(child);
                            self.builder.close();
                        }
                        _ => self.node(child),
                    }
                }
                self.builder.close();
            }
            "return_statement" => {
                self.builder.open(NodeKind::ReturnStmt, span);
                self.children(node);
                self.builder.close();
            }
            "break_statement" => {
                self.builder.leaf(NodeKind::BreakStmt, span);
            }
            "continue_statement" => {
                self.builder.leaf(NodeKind::ContinueStmt, span);
            }
            "expression_statement" | "go_statement" | "defer_statement" => {
                self.builder.open(NodeKind::ExprStmt, span);
                self.children(node);
                self.builder.close();
            }
            "short_var_declaration" => {
                let value = node.child_by_field_name("right");
                if let Some(left) = node.child_by_field_name("left") {
                    self.var_names(left, None, value);
                }
            }
            "var_declaration" | "const_declaration" => {
                let mut cursor = node.walk();
                for spec in node.named_children(&mut cursor) {
                    if matches!(spec.kind(), "var_spec" | "const_spec") {
                        let ty = self.field_text(spec, "type");
                        let value = spec.child_by_field_name("value");
                        self.var_names(spec, ty, value);
                    }
                }
            }
            "assignment_statement" => {
                self.builder.open(NodeKind::Assignment, span);
                if let Some(left) = node.child_by_field_name("left") {
                    self.children(left);
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.children(right);
                }
                self.builder.close();
            }
            "call_expression" => {
                let id = self.builder.open(NodeKind::CallExpr, span);
                if let Some(function) = node.child_by_field_name("function") {
                    if function.kind() == "identifier" {
                        let text = self.text(function).to_string();
                        self.builder.set_name(id, text);
                    } else {
                        self.node(function);
                    }
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.children(args);
                }
                self.builder.close();
            }
            "selector_expression" => {
                let id = self.builder.open(NodeKind::FieldAccess, span);
                if let Some(field) = self.field_text(node, "field") {
                    self.builder.set_name(id, field);
                }
                self.field(node, "operand");
                self.builder.close();
            }
            "binary_expression" => {
                let id = self.builder.open(NodeKind::BinaryExpr, span);
                if let Some(op) = self.field_text(node, "operator") {
                    if matches!(op.as_str(), "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||")
                    {
                        self.builder.set_type_name(id, "bool");
                    }
                    self.builder.set_name(id, op);
                }
                self.field(node, "left");
                self.field(node, "right");
                self.builder.close();
            }
            "unary_expression" => {
                let id = self.builder.open(NodeKind::UnaryExpr, span);
                if let Some(op) = self.field_text(node, "operator") {
                    if op == "!" {
                        self.builder.set_type_name(id, "bool");
                    }
                    self.builder.set_name(id, op);
                }
                self.field(node, "operand");
                self.builder.close();
            }
            "parenthesized_expression" => self.children(node),
            "identifier" | "field_identifier" | "type_identifier" => {
                let id = self.builder.leaf(NodeKind::Identifier, span);
                let text = self.text(node).to_string();
                self.builder.set_name(id, text);
            }
            "int_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Int), span);
                self.builder.set_type_name(id, "int");
            }
            "float_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Float), span);
                self.builder.set_type_name(id, "float64");
            }
            "interpreted_string_literal" | "raw_string_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Str), span);
                self.builder.set_type_name(id, "string");
            }
            "rune_literal" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Char), span);
                self.builder.set_type_name(id, "rune");
            }
            "true" | "false" => {
                let id = self.builder.leaf(NodeKind::Literal(LiteralKind::Bool), span);
                self.builder.set_type_name(id, "bool");
            }
            "nil" => {
                self.builder.leaf(NodeKind::Literal(LiteralKind::Null), span);
            }
            "comment" => {
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

    fn import_spec(&mut self, spec: Node<'_>) {
        let id = self.builder.leaf(NodeKind::ImportDecl, span_of(spec));
        if let Some(path) = self.field_text(spec, "path") {
            self.builder.set_name(id, path.trim_matches('"').to_string());
        }
    }

    fn type_spec(&mut self, spec: Node<'_>) {
        let name = self.field_text(spec, "name");
        let Some(ty) = spec.child_by_field_name("type") else {
            return;
        };
        let kind = match ty.kind() {
            "struct_type" => TypeDeclKind::Struct,
            "interface_type" => TypeDeclKind::Interface,
            _ => {
                // Alias or named basic type; not a type declaration in the
                // normalized sense.
                return;
            }
        };
        let id = self.builder.open(NodeKind::TypeDecl(kind), span_of(spec));
        if let Some(name) = name {
            self.builder.set_name(id, name);
        }
        self.type_parameters(spec);

        if kind == TypeDeclKind::Struct {
            let mut cursor = ty.walk();
            let field_list = ty
                .named_children(&mut cursor)
                .find(|c| c.kind() == "field_declaration_list");
            if let Some(fields) = field_list {
                let mut inner = fields.walk();
                for field in fields.named_children(&mut inner) {
                    if field.kind() != "field_declaration" {
                        continue;
                    }
                    let field_ty = self.field_text(field, "type");
                    let mut names = field.walk();
                    for name_node in field.named_children(&mut names) {
                        if name_node.kind() != "field_identifier" {
                            continue;
                        }
                        let fid = self.builder.leaf(NodeKind::FieldDecl, span_of(name_node));
                        let text = self.text(name_node).to_string();
                        self.builder.set_name(fid, text);
                        if let Some(ref t) = field_ty {
                            self.builder.set_type_name(fid, t.clone());
                        }
                    }
                }
            }
        }
        self.builder.close();
    }
}
