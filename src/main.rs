use jvmproxy::beans::{bean_copier_class, BeanCopierKey};
use jvmproxy::cache::ClassCache;
use jvmproxy::generator::generate_bytes;
use jvmproxy::jvm::{
    BaseType, BinaryName, ClassData, ClassGraph, FieldType, MethodDescriptor, Name,
    ParseDescriptor, UnqualifiedName,
};
use jvmproxy::naming::NamingPolicy;
use jvmproxy::proxy::{MixinGenerator, MixinStyle};
use jvmproxy::settings::Settings;
use jvmproxy::Error;

use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};

/// Command line interface, where every argument is either required or has a default
fn command() -> Command {
    let output_dir = Arg::new("output dir")
        .long("output-dir")
        .value_name("DIR")
        .default_value(".")
        .help("Directory under which class files are written");
    let runtime = Arg::new("runtime")
        .long("runtime-package")
        .value_name("PACKAGE")
        .default_value(Settings::DEFAULT_RUNTIME_PACKAGE)
        .help("Package of the runtime callback types (eg. `jvmproxy/runtime`)");

    Command::new("JVM proxy generator")
        .version(crate_version!())
        .about("Generate JVM classes that dispatch their methods to callbacks")
        .subcommand_required(true)
        .arg(output_dir.global(true))
        .arg(runtime.global(true))
        .subcommand(
            Command::new("bean-copier")
                .about("Generate a bean copier between two bean classes")
                .arg(
                    Arg::new("source")
                        .long("source")
                        .value_name("CLASS_NAME")
                        .required(true)
                        .help("Source bean class (eg. `foo/bar/Person`)"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_name("CLASS_NAME")
                        .required(true)
                        .help("Target bean class"),
                )
                .arg(
                    Arg::new("source property")
                        .long("source-property")
                        .value_name("NAME:DESCRIPTOR")
                        .action(ArgAction::Append)
                        .help("Readable property of the source (eg. `age:I`)"),
                )
                .arg(
                    Arg::new("target property")
                        .long("target-property")
                        .value_name("NAME:DESCRIPTOR")
                        .action(ArgAction::Append)
                        .help("Writable property of the target (eg. `age:J`)"),
                )
                .arg(
                    Arg::new("use converter")
                        .long("use-converter")
                        .action(ArgAction::SetTrue)
                        .help("Route every property through a `Converter`"),
                ),
        )
        .subcommand(
            Command::new("mixin-bean")
                .about("Generate a class aggregating the properties of several beans")
                .arg(
                    Arg::new("class")
                        .long("output-class")
                        .value_name("CLASS_NAME")
                        .required(true)
                        .help("Output class name (eg. `foo/bar/Mixin`)"),
                )
                .arg(
                    Arg::new("property")
                        .long("property")
                        .value_name("CLASS_NAME:NAME:DESCRIPTOR")
                        .action(ArgAction::Append)
                        .required(true)
                        .help("Read-write bean property (eg. `foo/Person:age:I`)"),
                ),
        )
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = command().get_matches();

    let runtime_package = string_arg(&matches, "runtime");
    let settings = Settings::new(&runtime_package)?;
    let mut graph = ClassGraph::with_java_library_types();
    settings.insert_runtime_types(&mut graph);
    let output_dir = PathBuf::from(string_arg(&matches, "output dir"));

    match matches.subcommand() {
        Some(("bean-copier", sub_matches)) => {
            let key = BeanCopierKey {
                source: make_name(string_arg(sub_matches, "source"))?,
                target: make_name(string_arg(sub_matches, "target"))?,
                use_converter: sub_matches.get_flag("use converter"),
            };
            let mut source = ClassData::new_class(key.source.clone(), BinaryName::OBJECT);
            for (name, typ) in properties(sub_matches, "source property")? {
                let getter = accessor_name(&name, &typ, true)?;
                source = source.with_method(getter, MethodDescriptor::new(vec![], Some(typ)));
            }
            let mut target = ClassData::new_class(key.target.clone(), BinaryName::OBJECT);
            for (name, typ) in properties(sub_matches, "target property")? {
                let setter = accessor_name(&name, &typ, false)?;
                target = target.with_method(setter, MethodDescriptor::new(vec![typ], None));
            }
            graph.insert(source);
            graph.insert(target);

            let cache = ClassCache::new();
            let naming = NamingPolicy::default();
            let class = bean_copier_class(&graph, &settings, &naming, &cache, &key)?;
            write_class(&output_dir, &class.name, &class.bytes)?;
        }
        Some(("mixin-bean", sub_matches)) => {
            let class_name: BinaryName = make_name(string_arg(sub_matches, "class"))?;
            let mut sources: Vec<BinaryName> = vec![];
            let specs = sub_matches
                .get_many::<String>("property")
                .into_iter()
                .flatten();
            for spec in specs {
                let (class, property) = spec.split_once(':').ok_or_else(|| {
                    Error::MalformedName(format!("expected CLASS:NAME:DESCRIPTOR, got '{}'", spec))
                })?;
                let class: BinaryName = make_name(class)?;
                let (name, typ) = parse_property(property)?;

                let mut data = graph
                    .get(&class)
                    .cloned()
                    .unwrap_or_else(|| ClassData::new_class(class.clone(), BinaryName::OBJECT));
                let getter = accessor_name(&name, &typ, true)?;
                let setter = accessor_name(&name, &typ, false)?;
                data = data
                    .with_method(getter, MethodDescriptor::new(vec![], Some(typ.clone())))
                    .with_method(setter, MethodDescriptor::new(vec![typ], None));
                graph.insert(data);
                if !sources.contains(&class) {
                    sources.push(class);
                }
            }

            let generator = MixinGenerator::new(
                &graph,
                &settings,
                class_name.clone(),
                MixinStyle::Beans,
                sources,
            )?;
            let bytes = generate_bytes(&generator)?;
            write_class(&output_dir, &class_name, &bytes)?;
        }
        _ => unreachable!("a subcommand is required"),
    }

    Ok(())
}

fn string_arg(matches: &ArgMatches, id: &str) -> String {
    matches
        .get_one::<String>(id)
        .expect("argument is required or defaulted")
        .to_owned()
}

fn make_name<N: Name>(name: impl Into<String>) -> Result<N, Error> {
    N::from_string(name.into()).map_err(Error::MalformedName)
}

/// Parse a `name:DESCRIPTOR` property specification
fn parse_property(spec: &str) -> Result<(String, FieldType), Error> {
    let (name, descriptor) = spec.split_once(':').ok_or_else(|| {
        Error::MalformedName(format!("expected NAME:DESCRIPTOR, got '{}'", spec))
    })?;
    let typ = FieldType::parse(descriptor)
        .map_err(|_| Error::MalformedName(format!("bad descriptor '{}'", descriptor)))?;
    Ok((name.to_owned(), typ))
}

fn properties(matches: &ArgMatches, id: &str) -> Result<Vec<(String, FieldType)>, Error> {
    matches
        .get_many::<String>(id)
        .into_iter()
        .flatten()
        .map(|spec| parse_property(spec))
        .collect()
}

/// `getFoo`/`isFoo` or `setFoo` for property `foo`
fn accessor_name(property: &str, typ: &FieldType, read: bool) -> Result<UnqualifiedName, Error> {
    let mut chars = property.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => return Err(Error::MalformedName(String::from("empty property name"))),
    };
    let prefix = match (read, typ) {
        (false, _) => "set",
        (true, FieldType::Base(BaseType::Boolean)) => "is",
        (true, _) => "get",
    };
    make_name(format!("{}{}", prefix, capitalized))
}

fn write_class(output_dir: &Path, name: &BinaryName, bytes: &[u8]) -> Result<(), Error> {
    let path = output_dir.join(format!("{}.class", name.as_str()));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    log::info!("Writing '{}'", path.display());
    fs::write(&path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn missing_arguments_are_rejected_by_the_parser() {
        let err = command()
            .try_get_matches_from(["jvmproxy", "bean-copier", "--source", "demo/Source"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = command()
            .try_get_matches_from(["jvmproxy", "mixin-bean", "--output-class", "demo/Mixin"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn string_arguments_fall_back_to_defaults() {
        let matches = command()
            .try_get_matches_from([
                "jvmproxy",
                "bean-copier",
                "--source",
                "demo/Source",
                "--target",
                "demo/Target",
            ])
            .unwrap();
        assert_eq!(string_arg(&matches, "runtime"), Settings::DEFAULT_RUNTIME_PACKAGE);
        assert_eq!(string_arg(&matches, "output dir"), ".");

        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "bean-copier");
        assert_eq!(string_arg(sub_matches, "source"), "demo/Source");
        assert_eq!(string_arg(sub_matches, "target"), "demo/Target");
    }
}
