//! The fixed diagnostic payload handed to the launcher.

use crate::Language;

/// Flags enabling host interop and worker threads on the launcher.
pub(crate) const LAUNCHER_FLAGS: &[&str] = &[
    "--polyglot",
    "--use-classpath-env-var",
    "--experimental-worker",
    "--jvm",
];

/// Script printing one JSON line: `launcher`, `java`, a boolean per probed
/// language and `worker_threads`.
pub(crate) fn diagnostic_script() -> String {
    let mut script = String::from(
        "function langCheck(lang) {\n\
        \x20 try {\n\
        \x20   return 42 == Polyglot.eval(lang, '42');\n\
        \x20 } catch (e) {\n\
        \x20   return false;\n\
        \x20 }\n\
        }\n\
        function moduleType(name) {\n\
        \x20 try {\n\
        \x20   return typeof require(name);\n\
        \x20 } catch (e) {\n\
        \x20   return 'undefined';\n\
        \x20 }\n\
        }\n\
        console.log(JSON.stringify({\n\
        \x20 'launcher' : null,\n\
        \x20 'java' : typeof Java,\n",
    );
    for lang in Language::all() {
        script.push_str(&format!("  '{id}' : langCheck('{id}'),\n", id = lang.id()));
    }
    script.push_str("  'worker_threads' : moduleType('worker_threads')\n}));\n");
    script
}

/// Full launcher argument list: flags, then `-e <script>`.
pub(crate) fn launcher_args() -> Vec<String> {
    LAUNCHER_FLAGS
        .iter()
        .map(|flag| flag.to_string())
        .chain(["-e".to_string(), diagnostic_script()])
        .collect()
}
