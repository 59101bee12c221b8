//! Init scripts that mask the automated browser's fingerprint. Installed
//! once per session, before the first navigation, so they run ahead of any
//! page script. Every override is wrapped so a throw logs and falls back to
//! stock behavior instead of breaking the page.

use tracing::warn;

use crate::browser::driver::PageDriver;

/// Pins WebGL identity parameters to a fixed plausible GPU signature.
pub const WEBGL_SPOOF: &str = r#"
(() => {
  try {
    if (typeof WebGLRenderingContext === 'undefined') {
      return;
    }
    const originalGetParameter = WebGLRenderingContext.prototype.getParameter;
    const OVERRIDES = {
      37445: 'NVIDIA GeForce RTX 3060 Ti/PCIe/SSE2',
      37446: 'Google Inc. (NVIDIA)',
      34047: 16384,
      34076: 16384,
      36349: 1024,
    };
    WebGLRenderingContext.prototype.getParameter = function (parameter) {
      try {
        return OVERRIDES[parameter] !== undefined
          ? OVERRIDES[parameter]
          : originalGetParameter.call(this, parameter);
      } catch (error) {
        return originalGetParameter.call(this, parameter);
      }
    };
  } catch (error) {
    console.warn('webgl override failed: ' + error);
  }
})();
"#;

/// Injects per-read pixel noise so canvas hashes differ between sessions.
pub const CANVAS_NOISE: &str = r#"
(() => {
  try {
    const originalToDataURL = HTMLCanvasElement.prototype.toDataURL;
    const originalGetImageData = CanvasRenderingContext2D.prototype.getImageData;
    const clamp = (value) => Math.max(0, Math.min(255, value));
    const addNoise = (data) => {
      for (let i = 0; i < data.length; i += 4) {
        const noise = Math.floor(Math.random() * 2);
        data[i] = clamp(data[i] + noise);
        data[i + 1] = clamp(data[i + 1] + noise);
        data[i + 2] = clamp(data[i + 2] + noise);
      }
    };
    HTMLCanvasElement.prototype.toDataURL = function (...args) {
      try {
        const context = this.getContext('2d');
        if (context) {
          const imageData = context.getImageData(0, 0, this.width, this.height);
          addNoise(imageData.data);
          context.putImageData(imageData, 0, 0);
        }
        return originalToDataURL.apply(this, args);
      } catch (error) {
        return originalToDataURL.apply(this, args);
      }
    };
    CanvasRenderingContext2D.prototype.getImageData = function (...args) {
      try {
        const imageData = originalGetImageData.apply(this, args);
        addNoise(imageData.data);
        return imageData;
      } catch (error) {
        return originalGetImageData.apply(this, args);
      }
    };
  } catch (error) {
    console.warn('canvas override failed: ' + error);
  }
})();
"#;

/// Overrides the navigator properties bot detectors probe, only where the
/// property is not already defined on the prototype.
pub const NAVIGATOR_OVERRIDES: &str = r#"
(() => {
  try {
    const overrides = {
      webdriver: undefined,
      hardwareConcurrency: 8,
      deviceMemory: 8,
      platform: 'Win32',
      languages: ['en-US', 'en'],
      maxTouchPoints: 0,
      bluetooth: { getAvailability: async () => true },
    };
    for (const [key, value] of Object.entries(overrides)) {
      try {
        if (!(key in Navigator.prototype)) {
          Object.defineProperty(navigator, key, { get: () => value });
        }
      } catch (error) {
        console.warn('navigator override failed for ' + key + ': ' + error);
      }
    }
  } catch (error) {
    console.warn('navigator overrides failed: ' + error);
  }
})();
"#;

pub fn init_scripts() -> [(&'static str, &'static str); 3] {
    [
        ("webgl", WEBGL_SPOOF),
        ("canvas", CANVAS_NOISE),
        ("navigator", NAVIGATOR_OVERRIDES),
    ]
}

/// Install all init scripts on a fresh session. A script that fails to
/// install is logged and skipped; losing one layer of masking is better
/// than losing the fetch.
pub async fn apply(driver: &dyn PageDriver) {
    for (name, script) in init_scripts() {
        if let Err(e) = driver.install_init_script(script).await {
            warn!("Failed to install {} masking script: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_self_invoking_and_guarded() {
        for (name, script) in init_scripts() {
            assert!(script.contains("(() => {"), "{name} is not an IIFE");
            assert!(script.contains("try {"), "{name} has no guard");
            assert!(script.contains("})();"), "{name} never invokes itself");
        }
    }

    #[test]
    fn navigator_override_leaves_existing_properties_alone() {
        assert!(NAVIGATOR_OVERRIDES.contains("!(key in Navigator.prototype)"));
    }
}
