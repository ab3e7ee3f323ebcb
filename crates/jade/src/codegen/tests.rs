use crate::ast::Block;
use crate::codegen::{neutralise, Emitter};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::parser::Parser;
use crate::Options;

fn compact() -> Options {
    Options {
        pretty_print: false,
        ..Options::default()
    }
}

fn tree(src: &str) -> Block {
    let mut parser = Parser::new(src, "test.jade");
    parser.parse().expect("parse").clone()
}

fn emit_with(src: &str, options: &Options) -> Result<String, Diagnostic> {
    Emitter::new(options).compile(&tree(src))
}

fn emit(src: &str) -> String {
    emit_with(src, &compact()).expect("compile")
}

#[test]
fn id_selector() {
    assert_eq!(emit("div#test"), "<div id=\"test\"></div>\n");
    assert_eq!(emit("p#a#b"), "<p id=\"b\"></p>\n");
}

#[test]
fn nested_tags_and_tagless_divs() {
    assert_eq!(
        emit("body\n\tspan#popup\n\t.wrap.container\n\t\t#top.header"),
        concat!(
            "<body><span id=\"popup\"></span>",
            "<div class=\"wrap container\"><div class=\"header\" id=\"top\"></div></div>",
            "</body>\n"
        )
    );
    assert_eq!(emit("div: p"), "<div><p></p></div>\n");
}

#[test]
fn empty_template_renders_nothing() {
    assert_eq!(emit(""), "");
}

#[test]
fn condition_wraps_the_block() {
    assert_eq!(emit("if X\n\tp"), "{{if .X}}<p></p>{{end}}\n");
    assert_eq!(
        emit("if a\n\tp\nelse\n\ti"),
        "{{if .a}}<p></p>{{else}}<i></i>{{end}}\n"
    );
    assert_eq!(
        emit("unless a\n\ti"),
        "{{$__jade_1 := not .a}}{{if $__jade_1}}<i></i>{{end}}\n"
    );
}

#[test]
fn else_if_nests_a_condition() {
    assert_eq!(
        emit("if a\n\tp\nelse if b\n\ti"),
        "{{if .a}}<p></p>{{else}}{{if .b}}<i></i>{{end}}{{end}}\n"
    );
}

#[test]
fn repeated_classes_concatenate() {
    assert_eq!(emit("p.a.b"), "<p class=\"a b\"></p>\n");
    assert_eq!(
        emit("div(class=\"a\", class=\"b\")"),
        "<div class=\"a b\"></div>\n"
    );
}

#[test]
fn guarded_attributes_are_wrapped() {
    assert_eq!(
        emit("p\n\t[title=\"x\"] ? ok"),
        "<p{{if .ok}} title=\"x\"{{end}}></p>\n"
    );
    assert_eq!(
        emit("p.a\n\t.b ? ok"),
        "<p class=\"a{{if .ok}} b{{end}}\"></p>\n"
    );
}

#[test]
fn attributes_are_sorted_by_name() {
    assert_eq!(
        emit("button(title=\"test\", style=\"text-align:center\") Label"),
        "<button style=\"text-align:center\" title=\"test\">Label</button>\n"
    );
}

#[test]
fn boolean_and_self_closing_tags() {
    assert_eq!(emit("div[name]"), "<div name></div>\n");
    assert_eq!(emit("img(src=\"a.png\")"), "<img src=\"a.png\" />\n");
}

#[test]
fn expression_attributes_hoist_their_temporaries() {
    assert_eq!(
        emit("div[data-map=json($)]"),
        "{{$__jade_1 := json .}}<div data-map=\"{{$__jade_1}}\"></div>\n"
    );
    assert_eq!(emit("p(style=$)"), "<p style=\"{{.}}\"></p>\n");
}

#[test]
fn event_handlers_are_marked_safe() {
    assert_eq!(
        emit(r#"button[onclick="foobar(" + $ + ")"] Label"#),
        concat!(
            "{{$__jade_1 := __jade_add \"foobar(\" .}}",
            "{{$__jade_2 := __jade_add $__jade_1 \")\"}}",
            "<button onclick=\"{{safeJS $__jade_2}}\">Label</button>\n"
        )
    );
    assert_eq!(
        emit(r#"button[onclick="foobar()"] Label"#),
        "<button onclick=\"foobar()\">Label</button>\n"
    );
}

#[test]
fn text_interpolation() {
    assert_eq!(emit("p Hello #{name}!"), "<p>Hello {{.name}}!</p>\n");
    assert_eq!(
        emit("p #{A + B * C}"),
        concat!(
            "<p>{{$__jade_1 := __jade_mul .B .C}}",
            "{{$__jade_2 := __jade_add .A $__jade_1}}{{$__jade_2}}</p>\n"
        )
    );
}

#[test]
fn literal_delimiters_are_neutralised() {
    assert_eq!(neutralise("a {{b}} c"), r#"a {{"{{"}}b{{"}}"}} c"#);
    assert_eq!(emit("p {{x}}"), "<p>{{\"{{\"}}x{{\"}}\"}}</p>\n");
}

#[test]
fn raw_text_is_not_interpolated() {
    assert_eq!(
        emit("html\n\tscript\n\t\tvar a = #{b};\n\t\talert(a)\n\tstyle\n\t\tbody {\n\t\t\tcolor: white\n\t\t}"),
        "<html><script>var a = #{b};\nalert(a)</script><style>body {\n\tcolor: white\n}</style></html>\n"
    );
}

#[test]
fn buffered_code() {
    assert_eq!(emit("p= \"test\""), "<p>{{\"test\"}}</p>\n");
    assert_eq!(emit("= $"), "{{.}}\n");
    assert_eq!(emit("!= $"), "{{unescaped .}}\n");
    assert_eq!(emit("p!= $"), "<p>{{unescaped .}}</p>\n");
}

#[test]
fn assignment_binds_the_lowered_value() {
    assert_eq!(
        emit("$x = 1 + 2"),
        "{{$__jade_1 := __jade_add 1 2}}{{$x := $__jade_1}}\n"
    );
}

#[test]
fn each_binds_value_and_index() {
    assert_eq!(
        emit("each $v in Items\n\tli= $v"),
        "{{range $v := .Items}}<li>{{$v}}</li>{{end}}\n"
    );
    assert_eq!(
        emit("each $v, $i in Items\n\tli= $i"),
        "{{range $i, $v := .Items}}<li>{{$i}}</li>{{end}}\n"
    );
    assert_eq!(emit("each $v in Items"), "");
}

#[test]
fn doctype_and_comments() {
    assert_eq!(emit("!!! 5"), "<!DOCTYPE html>\n");
    assert_eq!(
        emit("// hello \"x\""),
        "{{unescaped \"<!-- hello \\\"x\\\" -->\"}}\n"
    );
    assert_eq!(emit("//- hidden"), "");
}

#[test]
fn mixins_bind_arguments_before_the_body() {
    assert_eq!(emit("mixin a($a)\n\tp #{$a}\n+a(1)"), "{{$a := 1}}<p>{{$a}}</p>\n");
    assert_eq!(emit("mixin a()\n\tp Testing\n+a()"), "<p>Testing</p>\n");
    assert_eq!(
        emit("mixin a($a, $b)\n\tp #{$a} #{$b}\n+a(\"a, b\", A)"),
        "{{$a := \"a, b\"}}{{$b := .A}}<p>{{$a}} {{$b}}</p>\n"
    );
}

#[test]
fn mixin_errors_are_diagnostics() {
    let err = emit_with("+card(1)", &compact()).expect_err("undefined");
    assert_eq!(err.code, "E2005");
    assert_eq!(err.kind, DiagnosticKind::Semantic);

    let err = emit_with("mixin card($a)\n\tp\n+card()", &compact()).expect_err("arity");
    assert_eq!(err.code, "E2006");
    assert_eq!(err.position.line, 3);
}

#[test]
fn named_blocks_render_only_by_default() {
    assert_eq!(emit("block content\n\tp"), "<p></p>\n");
    assert_eq!(emit("block append content\n\tp"), "");
}

#[test]
fn expression_errors_carry_the_node_position() {
    let err = emit_with("div\n\tp= \"a\".b", &compact()).expect_err("unsupported");
    assert_eq!(err.code, "E3002");
    assert_eq!(err.position.line, 2);

    let err = emit_with("p #{1 +}", &compact()).expect_err("unparsable");
    assert_eq!(err.code, "E3001");
}

#[test]
fn custom_functions_are_called_directly() {
    let mut options = compact();
    options.functions.insert("foo".to_string());
    assert_eq!(
        emit_with("= foo(x)", &options).expect("compile"),
        "{{$__jade_1 := foo .x}}{{$__jade_1}}\n"
    );
}

#[test]
fn pretty_print_indents_with_tabs() {
    let options = Options::default();
    assert_eq!(
        emit_with("div\n\tp Hi\n\tspan", &options).expect("compile"),
        "<div>\n\t<p>Hi</p>\n\t<span></span>\n</div>\n"
    );
}

#[test]
fn line_markers_precede_new_lines() {
    let options = Options {
        line_numbers: true,
        ..compact()
    };
    assert_eq!(
        emit_with("p\nspan", &options).expect("compile"),
        "{{/* test.jade:1 */}}<p></p>{{/* test.jade:2 */}}<span></span>\n"
    );
}

#[test]
fn compiling_twice_is_identical() {
    let root = tree("mixin m($x)\n\tp= $x + 1\n+m(2)\ndiv[title=A * B]");
    let options = compact();
    let mut emitter = Emitter::new(&options);
    let first = emitter.compile(&root).expect("first");
    let second = emitter.compile(&root).expect("second");
    assert_eq!(first, second);
    assert!(first.starts_with("{{$x := 2}}"));
    assert!(first.contains("$__jade_1"));
}

#[test]
fn following_lines_render_as_siblings() {
    assert_eq!(emit("div\n.x"), "<div></div><div class=\"x\"></div>\n");
    assert_eq!(emit("p\n= name"), "<p></p>{{.name}}\n");
    assert_eq!(emit("span#a\n#b"), "<span id=\"a\"></span><div id=\"b\"></div>\n");
}

#[test]
fn nesting_follows_indentation() {
    let src = "html
\t\t\t\t\t\thead
\t\t\t\t\t\t\ttitle
\t\t\t\t\t\tbody
\t\t\t\t\t\t\tdiv: p
\t\t\t\t\t\t\t.anotherDiv: p";
    assert_eq!(
        emit(src),
        concat!(
            "<html><head><title></title></head><body>",
            "<div><p></p></div><div class=\"anotherDiv\"><p></p></div>",
            "</body></html>\n"
        )
    );

    let src = "body
\t\t\t\t\t    span#popup
\t\t\t\t\t\t.wrap.container
\t\t\t\t\t\t\t#top.header";
    assert_eq!(
        emit(src),
        concat!(
            "<body><span id=\"popup\"></span>",
            "<div class=\"wrap container\"><div class=\"header\" id=\"top\"></div></div>",
            "</body>\n"
        )
    );

    assert_eq!(emit("\n\t.cls\n    "), "<div class=\"cls\"></div>\n");
}

#[test]
fn class_lines_merge_into_the_owner() {
    let src = ".test
\t\t\t\t\t\tp.test1.test-2
\t\t\t\t\t\t\t[class=$]
\t\t\t\t\t\t\t.test3";
    assert_eq!(
        emit(src),
        "<div class=\"test\"><p class=\"test1 test-2 {{.}}\"><div class=\"test3\"></div></p></div>\n"
    );
}

#[test]
fn blank_lines_keep_bodies_attached() {
    assert_eq!(emit("if X\n\n\tp"), "{{if .X}}<p></p>{{end}}\n");
    assert_eq!(emit("div\n\n\tp"), "<div><p></p></div>\n");
    assert_eq!(
        emit("script\n\n\tif (a < b) { x = #{y} }"),
        "<script>if (a < b) { x = #{y} }</script>\n"
    );
}

#[test]
fn braces_next_to_interpolation_stay_literal() {
    assert_eq!(
        emit("p {#{x}}"),
        "<p>{{\"{\"}}{{.x}}{{\"}\"}}</p>\n"
    );
    assert_eq!(emit("p {a} #{x}"), "<p>{a} {{.x}}</p>\n");
}
