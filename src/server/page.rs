//! The single page: viewer pane on top, analysis pane below.

use crate::volume::VolumeState;

/// Render the page with the volume description embedded for the viewer.
/// The voxel buffer itself is fetched separately from `/api/volume/data`.
pub fn render(volume: &VolumeState) -> String {
    let state = serde_json::to_string(volume).unwrap_or_else(|_| "null".into());
    PAGE_TEMPLATE.replace("__VOLUME_STATE__", &state)
}

// The 3D rendering itself is delegated to vtk.js; this page only feeds it
// the volume geometry and voxel buffer served by the endpoints above.
const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Scanlens</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    html, body { height: 100%; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
      display: flex; flex-direction: column;
    }
    #viewer {
      flex: 1 1 60%; width: 100%; min-height: 0;
      border-bottom: 2px solid #ddd; overflow: hidden; position: relative;
      background: #000;
    }
    #viewer-note {
      position: absolute; top: 8px; left: 12px; color: #9ca3af; font-size: 13px;
    }
    #panel {
      flex: 1 1 40%; overflow-y: auto; padding: 20px;
      text-align: center; background: #f8f9fa;
    }
    h2 { margin-bottom: 10px; }
    #submit-analysis {
      padding: 10px 20px; font-size: 16px; background: #007bff; color: white;
      border: none; border-radius: 5px; cursor: pointer;
    }
    #submit-analysis:disabled { opacity: 0.6; cursor: wait; }
    .spinner {
      display: none; margin: 16px auto; width: 28px; height: 28px;
      border: 3px solid #dbeafe; border-top-color: #007bff; border-radius: 50%;
      animation: spin 0.8s linear infinite;
    }
    @keyframes spin { to { transform: rotate(360deg); } }
    #report-output {
      white-space: pre-wrap; text-align: left; margin: 16px auto 0;
      max-width: 800px; max-height: 300px; overflow-y: auto; padding: 15px;
      background: #ffffff; border: 1px solid #ccc; border-radius: 5px;
      box-shadow: 0 2px 4px rgba(0,0,0,0.1);
    }
    #report-output.error { color: #dc2626; }
  </style>
</head>
<body>
  <div id="viewer">
    <span id="viewer-note">Loading volume…</span>
  </div>

  <div id="panel">
    <h2>Analyze MRI Scan</h2>
    <button id="submit-analysis">Submit Analysis</button>
    <div class="spinner" id="spinner"></div>
    <div id="report-output">Press the button to analyze the MRI scan.</div>
  </div>

  <script src="https://unpkg.com/vtk.js"></script>
  <script>
    var volumeState = __VOLUME_STATE__;
    var viewerEl = document.getElementById('viewer');
    var viewerNote = document.getElementById('viewer-note');
    var button = document.getElementById('submit-analysis');
    var spinner = document.getElementById('spinner');
    var output = document.getElementById('report-output');

    function setupViewer(values) {
      var imageData = vtk.Common.DataModel.vtkImageData.newInstance();
      imageData.setDimensions(volumeState.dimensions[0], volumeState.dimensions[1], volumeState.dimensions[2]);
      imageData.setSpacing(volumeState.spacing[0], volumeState.spacing[1], volumeState.spacing[2]);
      imageData.setOrigin(volumeState.origin[0], volumeState.origin[1], volumeState.origin[2]);
      imageData.getPointData().setScalars(
        vtk.Common.Core.vtkDataArray.newInstance({ name: 'intensity', values: values, numberOfComponents: 1 })
      );

      var renderWindow = vtk.Rendering.Misc.vtkGenericRenderWindow.newInstance({ background: [0, 0, 0] });
      renderWindow.setContainer(viewerEl);
      renderWindow.resize();

      var mapper = vtk.Rendering.Core.vtkVolumeMapper.newInstance();
      mapper.setInputData(imageData);
      var actor = vtk.Rendering.Core.vtkVolume.newInstance();
      actor.setMapper(mapper);

      var lo = volumeState.scalar_range[0];
      var hi = Math.max(volumeState.scalar_range[1], lo + 1);
      var color = vtk.Rendering.Core.vtkColorTransferFunction.newInstance();
      color.addRGBPoint(lo, 0, 0, 0);
      color.addRGBPoint(hi, 1, 1, 1);
      var opacity = vtk.Common.DataModel.vtkPiecewiseFunction.newInstance();
      opacity.addPoint(lo, 0.0);
      opacity.addPoint(hi, 0.9);
      actor.getProperty().setRGBTransferFunction(0, color);
      actor.getProperty().setScalarOpacity(0, opacity);

      var renderer = renderWindow.getRenderer();
      renderer.addVolume(actor);
      renderer.resetCamera();
      renderWindow.getRenderWindow().render();
      viewerNote.style.display = 'none';

      window.addEventListener('resize', function() { renderWindow.resize(); });
    }

    fetch('/api/volume/data')
      .then(function(response) { return response.arrayBuffer(); })
      .then(function(buffer) { setupViewer(new Uint16Array(buffer)); })
      .catch(function(err) { viewerNote.textContent = 'Viewer unavailable: ' + err; });

    button.addEventListener('click', function() {
      button.disabled = true;
      spinner.style.display = 'block';
      output.className = '';
      output.textContent = 'Analyzing…';

      fetch('/api/analyze', { method: 'POST' })
        .then(function(response) { return response.json(); })
        .then(function(result) {
          output.className = result.ok ? '' : 'error';
          output.textContent = result.report;
        })
        .catch(function(err) {
          output.className = 'error';
          output.textContent = 'Request failed: ' + err;
        })
        .finally(function() {
          button.disabled = false;
          spinner.style.display = 'none';
        });
    });
  </script>
</body>
</html>
"#;
