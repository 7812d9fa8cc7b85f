//! Standard-library and builtin name sets.
//!
//! Resolution consults these before touching the filesystem: an import whose
//! first path segment is a standard-library name is never a project
//! dependency.

use phf::phf_set;

use crate::language::Language;

static GO_STDLIB: phf::Set<&'static str> = phf_set! {
    "archive", "bufio", "builtin", "bytes", "cmp", "compress", "container", "context",
    "crypto", "database", "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt",
    "go", "hash", "html", "image", "index", "io", "iter", "log", "maps", "math", "mime",
    "net", "os", "path", "plugin", "reflect", "regexp", "runtime", "slices", "sort",
    "strconv", "strings", "sync", "syscall", "testing", "text", "time", "unicode",
    "unique", "unsafe", "C",
};

static NODE_BUILTINS: phf::Set<&'static str> = phf_set! {
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http",
    "http2", "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process",
    "punycode", "querystring", "readline", "repl", "stream", "string_decoder", "sys",
    "timers", "tls", "trace_events", "tty", "url", "util", "v8", "vm", "wasi",
    "worker_threads", "zlib", "test",
};

static PYTHON_STDLIB: phf::Set<&'static str> = phf_set! {
    "__future__", "abc", "argparse", "array", "ast", "asyncio", "atexit", "base64",
    "bisect", "builtins", "bz2", "calendar", "cmath", "codecs", "collections",
    "concurrent", "configparser", "contextlib", "contextvars", "copy", "csv", "ctypes",
    "dataclasses", "datetime", "decimal", "difflib", "dis", "email", "enum", "errno",
    "fcntl", "filecmp", "fnmatch", "fractions", "functools", "gc", "getopt", "getpass",
    "gettext", "glob", "gzip", "hashlib", "heapq", "hmac", "html", "http", "imaplib",
    "importlib", "inspect", "io", "ipaddress", "itertools", "json", "keyword", "linecache",
    "locale", "logging", "lzma", "math", "mimetypes", "multiprocessing", "numbers",
    "operator", "os", "pathlib", "pickle", "pkgutil", "platform", "pprint", "queue",
    "random", "re", "secrets", "select", "selectors", "shlex", "shutil", "signal",
    "smtplib", "socket", "sqlite3", "ssl", "stat", "statistics", "string", "struct",
    "subprocess", "sys", "sysconfig", "tarfile", "tempfile", "textwrap", "threading",
    "time", "timeit", "tkinter", "token", "tokenize", "traceback", "types", "typing",
    "unicodedata", "unittest", "urllib", "uuid", "venv", "warnings", "weakref", "xml",
    "zipfile", "zlib", "zoneinfo",
};

static JAVA_STDLIB_ROOTS: phf::Set<&'static str> = phf_set! {
    "java", "javax", "jdk", "sun", "org.w3c", "org.xml", "org.ietf", "com.sun",
};

static CPP_STD_HEADERS: phf::Set<&'static str> = phf_set! {
    "algorithm", "any", "array", "atomic", "bitset", "cassert", "cctype", "cerrno",
    "cfloat", "charconv", "chrono", "climits", "cmath", "compare", "complex", "concepts",
    "condition_variable", "coroutine", "csignal", "cstdarg", "cstddef", "cstdint",
    "cstdio", "cstdlib", "cstring", "ctime", "deque", "exception", "execution",
    "filesystem", "format", "forward_list", "fstream", "functional", "future",
    "initializer_list", "iomanip", "ios", "iosfwd", "iostream", "istream", "iterator",
    "limits", "list", "locale", "map", "memory", "mutex", "new", "numeric", "optional",
    "ostream", "queue", "random", "ranges", "ratio", "regex", "set", "shared_mutex",
    "source_location", "span", "sstream", "stack", "stdexcept", "string", "string_view",
    "system_error", "thread", "tuple", "type_traits", "typeinfo", "unordered_map",
    "unordered_set", "utility", "valarray", "variant", "vector", "assert.h", "ctype.h",
    "errno.h", "float.h", "limits.h", "math.h", "signal.h", "stdarg.h", "stddef.h",
    "stdint.h", "stdio.h", "stdlib.h", "string.h", "time.h", "unistd.h", "pthread.h",
};

/// Go builtin functions and conversions that look like calls.
static GO_BUILTIN_CALLS: phf::Set<&'static str> = phf_set! {
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make",
    "max", "min", "new", "panic", "print", "println", "real", "recover",
    "bool", "byte", "complex64", "complex128", "error", "float32", "float64", "int",
    "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "any",
};

/// Check whether an import refers to the language's standard library.
///
/// The test is membership of the first path segment (or, for Java, the
/// leading one or two package components).
pub fn is_stdlib(lang: Language, import: &str) -> bool {
    match lang {
        Language::Go => {
            let first = import.split('/').next().unwrap_or("");
            // Module paths carry a domain in their first segment.
            !first.contains('.') && GO_STDLIB.contains(first)
        }
        Language::JavaScript => {
            if import.starts_with("node:") {
                return true;
            }
            let first = import.split('/').next().unwrap_or("");
            NODE_BUILTINS.contains(first)
        }
        Language::Python => {
            let first = import.split('.').next().unwrap_or("");
            PYTHON_STDLIB.contains(first)
        }
        Language::Java => {
            let mut parts = import.split('.');
            let first = parts.next().unwrap_or("");
            if JAVA_STDLIB_ROOTS.contains(first) {
                return true;
            }
            match parts.next() {
                Some(second) => JAVA_STDLIB_ROOTS.contains(format!("{}.{}", first, second).as_str()),
                None => false,
            }
        }
        Language::Cpp => CPP_STD_HEADERS.contains(import),
    }
}

/// Check whether a name is a Go builtin function or conversion.
pub fn is_go_builtin_call(name: &str) -> bool {
    GO_BUILTIN_CALLS.contains(name)
}
