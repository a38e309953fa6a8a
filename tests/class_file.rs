mod common;

use common::*;
use jvmproxy::generator::generate_bytes;
use jvmproxy::jvm::{ClassData, ClassGraph};
use jvmproxy::proxy::{CallbackType, ProxyGenerator};
use jvmproxy::settings::Settings;

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle.as_bytes())
}

#[test]
fn proxy_serializes_to_a_java5_class_file() {
    let settings = Settings::new(Settings::DEFAULT_RUNTIME_PACKAGE).unwrap();
    let mut graph = ClassGraph::with_java_library_types();
    settings.insert_runtime_types(&mut graph);
    graph.insert(
        ClassData::new_interface(class_name("demo/Calculator"))
            .with_method(method_name("add"), descriptor("(II)I")),
    );

    let generator = ProxyGenerator::new(&graph, &settings, class_name("demo/Calculator$$Proxy"))
        .interfaces(vec![class_name("demo/Calculator")])
        .callback_types(vec![CallbackType::InvocationHandler]);
    let bytes = generate_bytes(&generator).unwrap();

    assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 49]);
    for constant in [
        "demo/Calculator$$Proxy",
        "CALLBACK_0",
        "add$Method$0",
        "<clinit>",
        "java/lang/reflect/UndeclaredThrowableException",
        "<generated>",
    ] {
        assert!(contains(&bytes, constant), "missing constant {}", constant);
    }
}
