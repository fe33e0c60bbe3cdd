//! JavaScript runtime embedded in entry chunks.
//!
//! Every chunk registers module factories on `globalThis.__kiln_modules`;
//! the runtime (installed once per page) instantiates them on first
//! `require`, loads async chunks and injects development styles.

/// Module registry shared by all chunks on a page.
pub const REGISTRY: &str = "globalThis.__kiln_modules || (globalThis.__kiln_modules = {})";

/// Runtime prelude. Idempotent: later entry chunks only add to the chunk map.
pub const RUNTIME: &str = r#"(function (g) {
  if (g.__kiln) return;
  var modules = g.__kiln_modules || (g.__kiln_modules = {});
  var cache = {};
  var chunks = {};
  var loading = {};
  var hasOwn = Object.prototype.hasOwnProperty;

  function require(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var factory = modules[id];
    if (!factory) throw new Error("kiln: module " + id + " is not loaded");
    var module = (cache[id] = { id: id, exports: {} });
    factory.call(module.exports, module, module.exports, require);
    return module.exports;
  }

  require.d = function (exports, getters) {
    if (!exports.__esModule) Object.defineProperty(exports, "__esModule", { value: true });
    for (var key in getters) {
      if (hasOwn.call(getters, key) && !hasOwn.call(exports, key)) {
        Object.defineProperty(exports, key, { enumerable: true, get: getters[key] });
      }
    }
  };

  require.n = function (value) {
    if (value && value.__esModule) return value;
    var ns = { default: value };
    if (value && typeof value === "object") {
      for (var key in value) if (key !== "default" && hasOwn.call(value, key)) ns[key] = value[key];
    }
    return ns;
  };

  require.i = function (id) {
    return require.n(require(id));
  };

  require.star = function (exports, from) {
    var getters = {};
    Object.keys(from).forEach(function (key) {
      if (key !== "default") getters[key] = function () { return from[key]; };
    });
    require.d(exports, getters);
  };

  require.external = function (name) {
    return g[name];
  };

  require.chunks = function (map) {
    for (var id in map) if (hasOwn.call(map, id)) chunks[id] = map[id];
  };

  require.load = function (id) {
    if (modules[id]) return Promise.resolve().then(function () { return require.i(id); });
    var url = chunks[id];
    if (!url) return Promise.reject(new Error("kiln: no chunk provides " + id));
    if (!loading[url]) {
      loading[url] = new Promise(function (resolve, reject) {
        var script = document.createElement("script");
        script.src = url;
        script.onload = resolve;
        script.onerror = function () {
          delete loading[url];
          reject(new Error("kiln: failed to load " + url));
        };
        document.head.appendChild(script);
      });
    }
    return loading[url].then(function () { return require.i(id); });
  };

  require.style = function (id, css) {
    if (typeof document !== "undefined") {
      var el = document.querySelector('style[data-kiln="' + id + '"]');
      if (!el) {
        el = document.createElement("style");
        el.setAttribute("data-kiln", id);
        document.head.appendChild(el);
      }
      el.textContent = css;
    }
    return {};
  };

  g.__kiln = require;
})(globalThis);
"#;

/// Development client: listens on the hot-reload socket and refreshes the
/// page (or just its stylesheets) when chunks change.
pub const HMR_CLIENT: &str = r#"(function () {
  if (typeof WebSocket === "undefined" || globalThis.__kiln_hmr) return;
  globalThis.__kiln_hmr = true;
  var proto = location.protocol === "https:" ? "wss:" : "ws:";
  var ws = new WebSocket(proto + "//" + location.host + "/__kiln_hmr");
  ws.onmessage = function (event) {
    var msg = JSON.parse(event.data);
    if (msg.type === "connected") {
      console.log("[kiln] connected.");
    } else if (msg.type === "update") {
      var cssOnly = msg.chunks.length > 0 && msg.chunks.every(function (f) { return /\.css$/.test(f); });
      if (!cssOnly) return location.reload();
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
        link.href = link.href.replace(/\?.*$/, "") + "?t=" + Date.now();
      });
    } else if (msg.type === "reload") {
      location.reload();
    } else if (msg.type === "error") {
      console.error("[kiln] build failed: " + msg.message);
    }
  };
  ws.onclose = function () {
    console.log("[kiln] server connection lost.");
  };
})();
"#;
