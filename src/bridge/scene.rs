//! Scene description for the AR iframe
//!
//! A pure function of `(threat_level, collectibles)`. The bridge rebuilds the
//! whole scene on every change rather than diffing, so identical input must
//! always yield identical output.

use std::fmt::Write;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::sim::Collectible;

/// Ghost placement relative to the marker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatIndicator {
    pub level: f32,
    pub position: Vec3,
}

/// One unfound treasure chest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneTreasure {
    /// Index in the ledger (what box-click reports back)
    pub index: usize,
    pub position: Vec3,
}

/// Everything the render surface needs to draw the current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Present only while the threat level is above zero
    pub threat: Option<ThreatIndicator>,
    /// Unfound treasures only
    pub treasures: Vec<SceneTreasure>,
    pub found_count: usize,
    pub total_count: usize,
}

/// Ghost drifts up and toward the camera as the threat rises
pub fn threat_position(level: f32) -> Vec3 {
    Vec3::new(0.0, 1.0 + level / 100.0, -(3.0 - level / 50.0))
}

/// Build the scene for the given state projection
pub fn describe(threat_level: f32, collectibles: &[Collectible]) -> SceneDescription {
    let threat = (threat_level > 0.0).then(|| ThreatIndicator {
        level: threat_level,
        position: threat_position(threat_level),
    });

    let treasures = collectibles
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.found())
        .map(|(index, c)| SceneTreasure {
            index,
            position: c.position(),
        })
        .collect::<Vec<_>>();

    SceneDescription {
        threat,
        found_count: collectibles.len() - treasures.len(),
        total_count: collectibles.len(),
        treasures,
    }
}

const DOCUMENT_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>AR Experience</title>
<script src="https://aframe.io/releases/1.2.0/aframe.min.js"></script>
<script src="https://raw.githack.com/AR-js-org/AR.js/master/aframe/build/aframe-ar.js"></script>
<style>
body { margin: 0; overflow: hidden; }
.a-enter-vr { display: none; }
#progress-toast {
  position: fixed; bottom: 20px; left: 20px; z-index: 999;
  background: rgba(0, 0, 0, 0.7); color: white; padding: 10px 15px;
  border-radius: 5px; font: 14px Arial, sans-serif;
  opacity: 0; transition: opacity 0.5s ease;
}
#progress-toast.show { opacity: 1; }
</style>
<script>
function toast(text) {
  var el = document.getElementById('progress-toast');
  if (!el) return;
  el.textContent = text;
  el.classList.add('show');
  clearTimeout(el._hide);
  el._hide = setTimeout(function () { el.classList.remove('show'); }, 3000);
}
AFRAME.registerComponent('treasure-box', {
  schema: { index: { type: 'number', default: 0 } },
  init: function () {
    var post = function () {
      window.parent.postMessage({ type: 'box-click', index: this.data.index }, '*');
      this.el.setAttribute('animation', 'property: scale; to: 0.6 0.6 0.6; dur: 500; easing: easeInOutCubic');
    }.bind(this);
    this.el.addEventListener('click', post);
    this.el.addEventListener('touchend', post);
  }
});
AFRAME.registerComponent('model-error', {
  init: function () {
    this.el.addEventListener('model-error', function (e) { console.error('model failed to load', e.detail); });
  }
});
window.addEventListener('message', function (event) {
  var data = event.data;
  if (data && data.type === 'progress-update') {
    toast('Treasures: ' + data.foundCount + '/' + data.totalCount + ' (' + data.percent + '%)');
  }
});
</script>
</head>
<body>
<a-scene embedded
  arjs="sourceType: webcam; debugUIEnabled: false; detectionMode: mono_and_matrix; matrixCodeType: 3x3;"
  vr-mode-ui="enabled: false" renderer="logarithmicDepthBuffer: true;" loading-screen="enabled: false">
<a-assets>
<a-asset-item id="ghost-model" src="/models/ghost.glb"></a-asset-item>
<a-asset-item id="chest-model" src="/models/chest.glb"></a-asset-item>
</a-assets>
<a-entity camera position="0 0 0" look-controls="enabled: false">
<a-entity cursor="fuse: false; rayOrigin: mouse;" raycaster="objects: .clickable; far: 100" visible="false"></a-entity>
</a-entity>
<a-marker preset="hiro">
"#;

const SPIN: &str = r#"animation="property: rotation; to: 0 360 0; dur: 5000; easing: linear; loop: true""#;

impl SceneDescription {
    /// Render as the HTML document loaded into the sandboxed iframe.
    ///
    /// `revision` is echoed back in the `scene-loaded` message so the bridge
    /// can tell acknowledgements of stale documents apart.
    pub fn to_document(&self, revision: u64) -> String {
        let mut html = String::with_capacity(DOCUMENT_HEAD.len() + 2048);
        html.push_str(DOCUMENT_HEAD);

        if let Some(threat) = &self.threat {
            let _ = write!(
                html,
                "<a-entity position=\"{}\" scale=\"0.5 0.5 0.5\">\
                 <a-entity gltf-model=\"#ghost-model\" model-error {}></a-entity></a-entity>\n",
                vec3_attr(threat.position),
                SPIN
            );
        }

        for treasure in &self.treasures {
            let _ = write!(
                html,
                "<a-entity position=\"{}\" scale=\"0.5 0.5 0.5\" class=\"clickable\" treasure-box=\"index: {}\">\
                 <a-entity gltf-model=\"#chest-model\" model-error {}></a-entity></a-entity>\n",
                vec3_attr(treasure.position),
                treasure.index,
                SPIN
            );
        }

        // Progress toasts come only from `progress-update`, never on load
        html.push_str("</a-marker>\n</a-scene>\n<div id=\"progress-toast\"></div>\n<script>\n");
        let _ = write!(
            html,
            "(function () {{\n\
             var scene = document.querySelector('a-scene');\n\
             var done = function () {{ window.parent.postMessage({{ type: 'scene-loaded', revision: {} }}, '*'); }};\n\
             if (scene && !scene.hasLoaded) {{ scene.addEventListener('loaded', done); }} else {{ done(); }}\n\
             }})();\n",
            revision
        );
        html.push_str("</script>\n</body>\n</html>\n");
        html
    }
}

fn vec3_attr(v: Vec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Tuning;
    use crate::sim::{GameEvent, GameStore};

    fn store() -> GameStore {
        let mut store = GameStore::new(&crate::default_treasure_positions(), Tuning::default());
        store.dispatch(GameEvent::StartGame).unwrap();
        store
    }

    #[test]
    fn test_no_ghost_at_zero_threat() {
        let store = store();
        let scene = describe(0.0, store.state().collectibles());
        assert!(scene.threat.is_none());
        assert_eq!(scene.treasures.len(), 3);
        assert!(!scene.to_document(0).contains("#ghost-model\" model-error"));
    }

    #[test]
    fn test_ghost_placement() {
        assert_eq!(threat_position(0.0), Vec3::new(0.0, 1.0, -3.0));
        assert_eq!(threat_position(100.0), Vec3::new(0.0, 2.0, -1.0));
    }

    #[test]
    fn test_found_treasures_omitted() {
        let mut store = store();
        store.dispatch(GameEvent::Discover(1)).unwrap();
        let scene = describe(store.state().threat_level(), store.state().collectibles());

        let indices: Vec<usize> = scene.treasures.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(scene.found_count, 1);
        assert_eq!(scene.total_count, 3);

        let doc = scene.to_document(7);
        assert!(doc.contains("treasure-box=\"index: 0\""));
        assert!(!doc.contains("treasure-box=\"index: 1\""));
        assert!(doc.contains("treasure-box=\"index: 2\""));
        assert!(doc.contains("revision: 7"));
        // Toast shows once, from the progress-update posted after load
        assert!(!doc.contains("toast('Treasures: 1/3"));
        assert!(doc.contains("data.type === 'progress-update'"));
    }

    #[test]
    fn test_describe_is_idempotent() {
        let mut store = store();
        store.dispatch(GameEvent::SoundBurst).unwrap();
        store.dispatch(GameEvent::Discover(0)).unwrap();
        let state = store.state();

        let a = describe(state.threat_level(), state.collectibles());
        let b = describe(state.threat_level(), state.collectibles());
        assert_eq!(a, b);
        assert_eq!(a.to_document(3), b.to_document(3));
        assert!(a.threat.is_some());
    }

    #[test]
    fn test_scene_serializes() {
        let store = store();
        let scene = describe(40.0, store.state().collectibles());
        let json = serde_json::to_value(&scene).unwrap();
        assert_eq!(json["total_count"], 3);
        assert_eq!(json["treasures"].as_array().map(|a| a.len()), Some(3));
    }
}
