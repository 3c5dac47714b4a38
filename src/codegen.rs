// ABOUTME: Code generator emitting JavaScript text and source-map records from the IR

use crate::ir::{ClassMethod, Ir, MethodKind, TemplatePiece};
use crate::source::Position;
use crate::sourcemap::SourceMapping;

#[derive(Debug, Clone)]
pub struct GenOptions {
    pub indent: String,
    pub debug_comments: bool,
    /// Name recorded as the mapping source (the original file).
    pub source_file: Option<String>,
}

impl Default for GenOptions {
    fn default() -> Self {
        GenOptions {
            indent: "  ".to_string(),
            debug_comments: false,
            source_file: None,
        }
    }
}

pub struct GeneratedOutput {
    pub code: String,
    pub mappings: Vec<SourceMapping>,
}

/// Generate JavaScript for a whole program.
pub fn generate(program: &[Ir], options: &GenOptions) -> GeneratedOutput {
    let mut gen = Generator::new(options.clone());
    for stmt in program {
        gen.emit_stmt(stmt);
    }
    GeneratedOutput {
        code: gen.buf.out,
        mappings: gen.buf.mappings,
    }
}

// ============================================================================
// CodeBuffer
// ============================================================================

/// Write-through buffer tracking the generated (line, column) after every
/// write so mappings can be recorded at the point of emission.
struct CodeBuffer {
    out: String,
    line: u32,
    column: u32,
    indent_unit: String,
    indent_level: usize,
    mappings: Vec<SourceMapping>,
    source_file: Option<String>,
}

impl CodeBuffer {
    fn new(indent_unit: String, source_file: Option<String>) -> Self {
        CodeBuffer {
            out: String::new(),
            line: 1,
            column: 0,
            indent_unit,
            indent_level: 0,
            mappings: Vec::new(),
            source_file,
        }
    }

    fn write(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.out.push_str(text);
    }

    /// Record a mapping at the current generated position, then write.
    fn write_mapped(&mut self, text: &str, pos: Option<Position>, name: Option<&str>) {
        if let Some(pos) = pos {
            self.mappings.push(SourceMapping {
                generated: (self.line, self.column),
                original: Some((pos.line, pos.column)),
                source: self.source_file.clone(),
                name: name.map(str::to_string),
            });
        }
        self.write(text);
    }

    fn newline(&mut self) {
        self.write("\n");
        for _ in 0..self.indent_level {
            let unit = self.indent_unit.clone();
            self.write(&unit);
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }
}

// ============================================================================
// Precedence
// ============================================================================

fn binary_precedence(op: &str) -> u8 {
    match op {
        "||" => 4,
        "&&" => 5,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" => 8,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        _ => 7,
    }
}

fn precedence(ir: &Ir) -> u8 {
    match ir {
        Ir::AssignmentExpression { .. } => 2,
        Ir::ConditionalExpression { .. } => 3,
        Ir::BinaryExpression { operator, .. } => binary_precedence(operator),
        Ir::UnaryExpression { .. } => 14,
        Ir::CallExpression { .. } | Ir::NewExpression { .. } | Ir::MemberExpression { .. } => 17,
        Ir::FunctionExpression { .. } => 2,
        _ => 20,
    }
}

// ============================================================================
// Generator
// ============================================================================

struct Generator {
    buf: CodeBuffer,
    debug_comments: bool,
}

impl Generator {
    fn new(options: GenOptions) -> Self {
        Generator {
            buf: CodeBuffer::new(options.indent, options.source_file),
            debug_comments: options.debug_comments,
        }
    }

    // ===== Statements =====

    fn emit_stmt(&mut self, stmt: &Ir) {
        if self.debug_comments {
            if let Some(pos) = stmt.pos() {
                self.buf.write(&format!("/* HQL:{} */ ", pos.line));
            }
        }
        match stmt {
            Ir::VariableDeclaration {
                kind,
                pattern,
                init,
                pos,
            } => {
                self.buf.write_mapped(kind.keyword(), *pos, None);
                self.buf.write(" ");
                self.emit_pattern(pattern);
                if let Some(init) = init {
                    self.buf.write(" = ");
                    self.emit_expr(init, 2);
                }
                self.buf.write(";");
                self.buf.newline();
            }
            Ir::FunctionDeclaration {
                name,
                params,
                body,
                is_generator,
                is_async,
                pos,
            } => {
                if *is_async {
                    self.buf.write("async ");
                }
                self.buf.write_mapped("function", *pos, Some(name.as_str()));
                if *is_generator {
                    self.buf.write("*");
                }
                self.buf.write(" ");
                self.buf.write(name);
                self.emit_params(params);
                self.buf.write(" ");
                self.emit_block(body);
                self.buf.newline();
            }
            Ir::ClassDeclaration {
                name,
                superclass,
                methods,
                pos,
            } => {
                self.buf.write_mapped("class", *pos, Some(name.as_str()));
                self.buf.write(" ");
                self.buf.write(name);
                if let Some(superclass) = superclass {
                    self.buf.write(" extends ");
                    self.emit_expr(superclass, 17);
                }
                self.buf.write(" {");
                self.buf.indent();
                for method in methods {
                    self.buf.newline();
                    self.emit_class_method(method);
                }
                self.buf.dedent();
                self.buf.newline();
                self.buf.write("}");
                self.buf.newline();
            }
            Ir::IfStatement {
                test,
                consequent,
                alternate,
                pos,
            } => {
                self.buf.write_mapped("if", *pos, None);
                self.buf.write(" (");
                self.emit_expr(test, 2);
                self.buf.write(") ");
                self.emit_block(consequent);
                if let Some(alternate) = alternate {
                    self.buf.write(" else ");
                    if matches!(alternate.as_ref(), Ir::IfStatement { .. }) {
                        self.emit_stmt_inline(alternate);
                    } else {
                        self.emit_block(alternate);
                    }
                }
                self.buf.newline();
            }
            Ir::WhileStatement { test, body, pos } => {
                self.buf.write_mapped("while", *pos, None);
                self.buf.write(" (");
                self.emit_expr(test, 2);
                self.buf.write(") ");
                self.emit_block(body);
                self.buf.newline();
            }
            Ir::ForOfStatement {
                kind,
                pattern,
                right,
                body,
                pos,
            } => {
                self.buf.write_mapped("for", *pos, None);
                self.buf.write(" (");
                self.buf.write(kind.keyword());
                self.buf.write(" ");
                self.emit_pattern(pattern);
                self.buf.write(" of ");
                self.emit_expr(right, 2);
                self.buf.write(") ");
                self.emit_block(body);
                self.buf.newline();
            }
            Ir::ReturnStatement { argument, pos } => {
                self.buf.write_mapped("return", *pos, None);
                if let Some(argument) = argument {
                    self.buf.write(" ");
                    self.emit_expr(argument, 2);
                }
                self.buf.write(";");
                self.buf.newline();
            }
            Ir::ThrowStatement { argument, pos } => {
                self.buf.write_mapped("throw", *pos, None);
                self.buf.write(" ");
                self.emit_expr(argument, 2);
                self.buf.write(";");
                self.buf.newline();
            }
            Ir::BreakStatement { pos } => {
                self.buf.write_mapped("break;", *pos, None);
                self.buf.newline();
            }
            Ir::ContinueStatement { pos } => {
                self.buf.write_mapped("continue;", *pos, None);
                self.buf.newline();
            }
            Ir::TryStatement {
                block,
                handler_param,
                handler,
                finalizer,
                pos,
            } => {
                self.buf.write_mapped("try", *pos, None);
                self.buf.write(" ");
                self.emit_block(block);
                if let Some(handler) = handler {
                    self.buf.write(" catch ");
                    if let Some(param) = handler_param {
                        self.buf.write("(");
                        self.buf.write(param);
                        self.buf.write(") ");
                    }
                    self.emit_block(handler);
                }
                if let Some(finalizer) = finalizer {
                    self.buf.write(" finally ");
                    self.emit_block(finalizer);
                }
                self.buf.newline();
            }
            Ir::BlockStatement { .. } => {
                self.emit_block(stmt);
                self.buf.newline();
            }
            Ir::ImportDeclaration {
                specifiers,
                source,
                pos,
            } => {
                self.buf.write_mapped("import", *pos, None);
                self.buf.write(" { ");
                for (i, spec) in specifiers.iter().enumerate() {
                    if i > 0 {
                        self.buf.write(", ");
                    }
                    self.buf.write(&spec.local);
                }
                self.buf.write(" } from ");
                self.buf.write(&js_string(source));
                self.buf.write(";");
                self.buf.newline();
            }
            Ir::ExportDeclaration { names, pos } => {
                self.buf.write_mapped("export", *pos, None);
                self.buf.write(" { ");
                for (i, (local, _exported)) in names.iter().enumerate() {
                    if i > 0 {
                        self.buf.write(", ");
                    }
                    self.buf.write(local);
                }
                self.buf.write(" };");
                self.buf.newline();
            }
            Ir::ExpressionStatement { expression, pos } => {
                let needs_parens = matches!(
                    expression.as_ref(),
                    Ir::ObjectExpression { .. } | Ir::FunctionExpression { .. }
                );
                if let Some(pos) = pos {
                    self.buf.write_mapped("", Some(*pos), None);
                }
                if needs_parens {
                    self.buf.write("(");
                }
                self.emit_expr(expression, 0);
                if needs_parens {
                    self.buf.write(")");
                }
                self.buf.write(";");
                self.buf.newline();
            }
            // An expression in statement position (already-lowered trees)
            other => {
                self.emit_expr(other, 0);
                self.buf.write(";");
                self.buf.newline();
            }
        }
    }

    /// Emit a statement without the trailing newline discipline (used for
    /// `else if` chains).
    fn emit_stmt_inline(&mut self, stmt: &Ir) {
        // Trim the newline the nested statement appends
        self.emit_stmt(stmt);
        while self.buf.out.ends_with(['\n', ' ']) {
            self.buf.out.pop();
        }
        // Reset tracked position to the trimmed output
        self.recompute_position();
    }

    fn recompute_position(&mut self) {
        let line = self.buf.out.matches('\n').count() as u32 + 1;
        let column = self
            .buf
            .out
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count() as u32)
            .unwrap_or(0);
        self.buf.line = line;
        self.buf.column = column;
    }

    /// Emit a block statement (or wrap a single statement in braces).
    fn emit_block(&mut self, stmt: &Ir) {
        match stmt {
            Ir::BlockStatement { body, .. } => {
                self.buf.write("{");
                self.buf.indent();
                for s in body {
                    self.buf.newline();
                    self.emit_stmt_no_trailing(s);
                }
                self.buf.dedent();
                self.buf.newline();
                self.buf.write("}");
            }
            other => {
                self.buf.write("{");
                self.buf.indent();
                self.buf.newline();
                self.emit_stmt_no_trailing(other);
                self.buf.dedent();
                self.buf.newline();
                self.buf.write("}");
            }
        }
    }

    fn emit_stmt_no_trailing(&mut self, stmt: &Ir) {
        self.emit_stmt(stmt);
        while self.buf.out.ends_with('\n') || self.buf.out.ends_with(&self.buf.indent_unit) {
            let trimmed = self
                .buf
                .out
                .trim_end_matches(&self.buf.indent_unit)
                .trim_end_matches('\n')
                .len();
            if trimmed == self.buf.out.len() {
                break;
            }
            self.buf.out.truncate(trimmed);
        }
        self.recompute_position();
    }

    fn emit_class_method(&mut self, method: &ClassMethod) {
        match method.kind {
            MethodKind::Static => {
                self.buf.write_mapped("static ", method.pos, None);
                self.buf.write(&method.key);
            }
            _ => {
                self.buf
                    .write_mapped(&method.key, method.pos, Some(method.key.as_str()));
            }
        }
        self.emit_params(&method.params);
        self.buf.write(" ");
        self.emit_block(&method.body);
    }

    fn emit_params(&mut self, params: &[Ir]) {
        self.buf.write("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.buf.write(", ");
            }
            self.emit_pattern(param);
        }
        self.buf.write(")");
    }

    fn emit_pattern(&mut self, pattern: &Ir) {
        match pattern {
            Ir::ArrayPattern { elements, rest, pos } => {
                self.buf.write_mapped("[", *pos, None);
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.buf.write(", ");
                    }
                    self.emit_pattern(element);
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        self.buf.write(", ");
                    }
                    self.buf.write("...");
                    self.emit_pattern(rest);
                }
                self.buf.write("]");
            }
            Ir::ObjectPattern {
                properties,
                rest,
                pos,
            } => {
                self.buf.write_mapped("{", *pos, None);
                for (i, (key, local)) in properties.iter().enumerate() {
                    if i > 0 {
                        self.buf.write(", ");
                    }
                    if key == local {
                        self.buf.write(key);
                    } else {
                        self.buf.write(key);
                        self.buf.write(": ");
                        self.buf.write(local);
                    }
                }
                if let Some(rest) = rest {
                    if !properties.is_empty() {
                        self.buf.write(", ");
                    }
                    self.buf.write("...");
                    self.buf.write(rest);
                }
                self.buf.write("}");
            }
            Ir::SpreadElement { argument, pos } => {
                self.buf.write_mapped("...", *pos, None);
                self.emit_pattern(argument);
            }
            other => self.emit_expr(other, 0),
        }
    }

    // ===== Expressions =====

    fn emit_expr(&mut self, expr: &Ir, min_prec: u8) {
        let wrap = precedence(expr) < min_prec;
        if wrap {
            self.buf.write("(");
        }
        self.emit_expr_bare(expr);
        if wrap {
            self.buf.write(")");
        }
    }

    fn emit_expr_bare(&mut self, expr: &Ir) {
        match expr {
            Ir::Identifier {
                name,
                pos,
                original,
            } => {
                self.buf
                    .write_mapped(name, *pos, original.as_deref().or(Some(name.as_str())));
            }
            Ir::NumericLiteral { value, pos } => {
                let text = format_number(*value);
                self.buf.write_mapped(&text, *pos, None);
            }
            Ir::BigIntLiteral { digits, pos } => {
                self.buf.write_mapped(&format!("{}n", digits), *pos, None);
            }
            Ir::StringLiteral { value, pos } => {
                self.buf.write_mapped(&js_string(value), *pos, None);
            }
            Ir::BoolLiteral { value, pos } => {
                self.buf
                    .write_mapped(if *value { "true" } else { "false" }, *pos, None);
            }
            Ir::NullLiteral { pos } => {
                self.buf.write_mapped("null", *pos, None);
            }
            Ir::ArrayExpression { elements, pos } => {
                self.buf.write_mapped("[", *pos, None);
                self.write_comma_separated(elements);
                self.buf.write("]");
            }
            Ir::ObjectExpression { properties, pos } => {
                self.buf.write_mapped("{", *pos, None);
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.buf.write(", ");
                    }
                    self.emit_expr(property, 0);
                }
                self.buf.write("}");
            }
            Ir::ObjectProperty {
                key,
                value,
                computed,
                shorthand,
                pos,
            } => {
                if *computed {
                    self.buf.write_mapped("[", *pos, None);
                    self.emit_expr(key, 2);
                    self.buf.write("]");
                } else {
                    self.emit_property_key(key);
                }
                if !*shorthand {
                    self.buf.write(": ");
                    self.emit_expr(value, 2);
                }
            }
            Ir::MemberExpression {
                object,
                property,
                computed,
                pos,
            } => {
                self.emit_expr(object, 17);
                if *computed {
                    self.buf.write_mapped("[", *pos, None);
                    self.emit_expr(property, 2);
                    self.buf.write("]");
                } else {
                    self.buf.write_mapped(".", *pos, None);
                    self.emit_expr_bare(property);
                }
            }
            Ir::CallExpression {
                callee,
                arguments,
                pos,
            } => {
                // IIFEs parenthesize their callee
                if matches!(callee.as_ref(), Ir::FunctionExpression { .. }) {
                    self.buf.write("(");
                    self.emit_expr_bare(callee);
                    self.buf.write(")");
                } else {
                    self.emit_expr(callee, 17);
                }
                self.buf.write_mapped("(", *pos, None);
                self.write_comma_separated(arguments);
                self.buf.write(")");
            }
            Ir::NewExpression {
                callee,
                arguments,
                pos,
            } => {
                self.buf.write_mapped("new ", *pos, None);
                self.emit_expr(callee, 17);
                self.buf.write("(");
                self.write_comma_separated(arguments);
                self.buf.write(")");
            }
            Ir::BinaryExpression {
                operator,
                left,
                right,
                pos,
            } => {
                let prec = binary_precedence(operator);
                self.emit_expr(left, prec);
                self.buf.write(" ");
                self.buf.write_mapped(operator, *pos, None);
                self.buf.write(" ");
                self.emit_expr(right, prec + 1);
            }
            Ir::UnaryExpression {
                operator,
                argument,
                pos,
            } => {
                self.buf.write_mapped(operator, *pos, None);
                self.emit_expr(argument, 14);
            }
            Ir::AssignmentExpression { target, value, pos } => {
                self.emit_expr(target, 17);
                self.buf.write_mapped(" = ", *pos, None);
                self.emit_expr(value, 2);
            }
            Ir::ConditionalExpression {
                test,
                consequent,
                alternate,
                pos,
            } => {
                self.emit_expr(test, 4);
                self.buf.write_mapped(" ? ", *pos, None);
                self.emit_expr(consequent, 3);
                self.buf.write(" : ");
                self.emit_expr(alternate, 3);
            }
            Ir::FunctionExpression {
                name,
                params,
                body,
                is_generator,
                is_async,
                pos,
            } => {
                if *is_async {
                    self.buf.write("async ");
                }
                self.buf
                    .write_mapped("function", *pos, name.as_deref());
                if *is_generator {
                    self.buf.write("*");
                }
                if let Some(name) = name {
                    self.buf.write(" ");
                    self.buf.write(name);
                }
                self.buf.write(" ");
                self.emit_params(params);
                self.buf.write(" ");
                self.emit_block(body);
            }
            Ir::TemplateLiteral { parts, pos } => {
                self.buf.write_mapped("`", *pos, None);
                for part in parts {
                    match part {
                        TemplatePiece::Text(text) => {
                            self.buf.write(&template_escape(text));
                        }
                        TemplatePiece::Expr(expr) => {
                            self.buf.write("${");
                            self.emit_expr(expr, 0);
                            self.buf.write("}");
                        }
                    }
                }
                self.buf.write("`");
            }
            Ir::SpreadElement { argument, pos } => {
                self.buf.write_mapped("...", *pos, None);
                self.emit_expr(argument, 17);
            }
            Ir::ArrayPattern { .. } | Ir::ObjectPattern { .. } => {
                self.emit_pattern(expr);
            }
            // Statement nodes that slipped into expression position emit
            // inside an IIFE so the output stays an expression
            other => {
                self.buf.write("(function () ");
                let block = Ir::block(vec![other.clone()]);
                self.emit_block(&block);
                self.buf.write(")()");
            }
        }
    }

    /// Property keys render in dot/identifier form when possible, quoted
    /// otherwise. Private `#name` keys pass through.
    fn emit_property_key(&mut self, key: &Ir) {
        match key {
            Ir::Identifier { name, pos, .. } if is_identifier_name(name) => {
                self.buf.write_mapped(name, *pos, None);
            }
            Ir::StringLiteral { value, pos } if is_identifier_name(value) => {
                self.buf.write_mapped(value, *pos, None);
            }
            Ir::StringLiteral { value, pos } => {
                self.buf.write_mapped(&js_string(value), *pos, None);
            }
            other => self.emit_expr(other, 0),
        }
    }

    fn write_comma_separated(&mut self, items: &[Ir]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.buf.write(", ");
            }
            self.emit_expr(item, 2);
        }
    }
}

// ============================================================================
// Text helpers
// ============================================================================

/// `^[A-Za-z_$][A-Za-z0-9_$]*$`, plus `#name` private fields.
pub fn is_identifier_name(name: &str) -> bool {
    let body = name.strip_prefix('#').unwrap_or(name);
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn template_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CancelToken;
    use crate::optimize::optimize_program;
    use crate::reader::read_forms;
    use crate::transform::transform_program;

    fn gen(src: &str) -> String {
        let forms = read_forms(src).unwrap();
        let program = transform_program(&forms).unwrap();
        let program = optimize_program(program, &CancelToken::new()).unwrap();
        generate(&program, &GenOptions::default()).code
    }

    #[test]
    fn test_simple_arithmetic() {
        let code = gen("(+ 1 2)");
        assert!(code.contains("1 + 2"));
    }

    #[test]
    fn test_const_declaration() {
        let code = gen("(const x 42)");
        assert!(code.contains("const x = 42;"));
    }

    #[test]
    fn test_function_declaration_returns_tail() {
        let code = gen("(fn add [a b] (+ a b))");
        assert!(code.contains("function add(a, b)"));
        assert!(code.contains("return a + b;"));
    }

    #[test]
    fn test_member_dot_vs_computed() {
        let code = gen("(js-get obj \"name\")");
        assert!(code.contains("obj.name"));

        let code = gen("(js-get obj \"my-key\")");
        assert!(code.contains("obj[\"my-key\"]"));
    }

    #[test]
    fn test_private_field_preserved() {
        let code = gen("(js-get this \"#secret\")");
        assert!(code.contains("this.#secret"));
    }

    #[test]
    fn test_template_literal() {
        let code = gen("`hi ${name}!`");
        assert!(code.contains("`hi ${name}!`"));
    }

    #[test]
    fn test_tco_emits_while_true() {
        let code = gen("(fn fact [n acc] (if (<= n 1) acc (fact (- n 1) (* n acc))))");
        assert!(code.contains("while (true)"));
        assert!(code.contains("continue;"));
    }

    #[test]
    fn test_early_return_trampoline_emitted() {
        let code = gen("(fn find [xs] (for-of [x xs] (if (> x 10) (return x))) nil)");
        assert!(code.contains("try {"));
        assert!(code.contains("catch (__hql_ret__)"));
        assert!(code.contains("__hql_early_return__"));
    }

    #[test]
    fn test_no_threading_tokens_in_output() {
        let code = gen("(->> [1 2 3 4 5] (filter even?) (map inc) (reduce + 0))");
        assert!(!code.contains("->>"));
        assert!(code.contains("reduce"));
        assert!(code.contains("__hql_get_op"));
    }

    #[test]
    fn test_import_export() {
        let code = gen("(import [helper] from \"npm:lodash\") (export [helper])");
        assert!(code.contains("import { helper } from \"npm:lodash\";"));
        assert!(code.contains("export { helper };"));
    }

    #[test]
    fn test_mappings_present_for_positions() {
        let forms = read_forms("(const x 42)").unwrap();
        let program = transform_program(&forms).unwrap();
        let out = generate(&program, &GenOptions::default());
        assert!(!out.mappings.is_empty());
        // First mapping points at line 1 of the source
        assert_eq!(out.mappings[0].original.unwrap().0, 1);
    }

    #[test]
    fn test_identifier_mapping_preserves_original_name() {
        let forms = read_forms("(my-helper 1)").unwrap();
        let program = transform_program(&forms).unwrap();
        let out = generate(&program, &GenOptions::default());
        assert!(out
            .mappings
            .iter()
            .any(|m| m.name.as_deref() == Some("my-helper")));
    }

    #[test]
    fn test_debug_comments() {
        let forms = read_forms("(const x 1)").unwrap();
        let program = transform_program(&forms).unwrap();
        let options = GenOptions {
            debug_comments: true,
            ..Default::default()
        };
        let out = generate(&program, &options);
        assert!(out.code.contains("/* HQL:1 */"));
    }

    #[test]
    fn test_enum_emits_frozen_object() {
        let code = gen("(enum Color red green)");
        assert!(code.contains("Object.freeze"));
        assert!(code.contains("red: \"red\""));
    }

    #[test]
    fn test_nested_operator_precedence() {
        let code = gen("(* (+ 1 2) 3)");
        assert!(code.contains("(1 + 2) * 3"));
    }

    #[test]
    fn test_match_output_avoids_keywords() {
        let code = gen("(match 10 (case x (if (> x 0)) \"positive\") (default \"zero\"))");
        assert!(!code.contains("switch"));
        assert!(!code.contains("case "));
    }
}
